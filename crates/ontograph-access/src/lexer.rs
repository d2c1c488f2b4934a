//! Lexical pre-pass over Cypher text.
//!
//! Nothing here parses Cypher. [`blank`] replaces the contents of string
//! literals and comments with spaces so later scans never mistake a quoted
//! `RETURN` or a commented-out clause for query structure. Blanked text has
//! the same byte offsets as the input. [`words`] then yields bare words with
//! their bracket depth.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("unterminated backtick identifier")]
    UnterminatedIdentifier,
}

/// Copy of `query` with literal contents and comments blanked.
///
/// Quotes are kept so an empty literal still reads as a value. Backtick
/// identifiers are kept verbatim.
pub fn blank(query: &str) -> Result<String, LexError> {
    let mut out = String::with_capacity(query.len());
    let mut chars = query.chars().peekable();
    let space = |out: &mut String, c: char| {
        out.extend(std::iter::repeat(' ').take(c.len_utf8()));
    };

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push(c);
                loop {
                    match chars.next() {
                        None => return Err(LexError::UnterminatedString),
                        Some('\\') => {
                            let Some(escaped) = chars.next() else {
                                return Err(LexError::UnterminatedString);
                            };
                            out.push(' ');
                            space(&mut out, escaped);
                        }
                        Some(q) if q == c => {
                            out.push(c);
                            break;
                        }
                        Some(other) => space(&mut out, other),
                    }
                }
            }
            '`' => {
                out.push(c);
                loop {
                    match chars.next() {
                        None => return Err(LexError::UnterminatedIdentifier),
                        Some('`') if chars.peek() == Some(&'`') => {
                            chars.next();
                            out.push_str("__");
                        }
                        Some('`') => {
                            out.push('`');
                            break;
                        }
                        Some(other) => out.push(other),
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                out.push(' ');
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                    space(&mut out, next);
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str("  ");
                let mut closed = false;
                while let Some(next) = chars.next() {
                    if next == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        out.push_str("  ");
                        closed = true;
                        break;
                    }
                    if next == '\n' {
                        out.push('\n');
                    } else {
                        space(&mut out, next);
                    }
                }
                if !closed {
                    return Err(LexError::UnterminatedComment);
                }
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

/// First unbalanced bracket in blanked text, if any.
pub fn unbalanced(text: &str) -> Option<char> {
    let mut stack = Vec::new();
    let mut in_ident = false;
    for c in text.chars() {
        if c == '`' {
            in_ident = !in_ident;
            continue;
        }
        if in_ident {
            continue;
        }
        match c {
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let open = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(open) {
                    return Some(c);
                }
            }
            _ => {}
        }
    }
    stack.pop()
}

/// A bare word of blanked text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub start: usize,
    pub end: usize,
    pub upper: String,
    /// Combined `()`, `[]`, `{}` nesting at the word.
    pub depth: usize,
    /// Preceded by `.`, `:` or `$`, so a property, label, or parameter name.
    pub qualified: bool,
}

impl Word {
    pub fn is(&self, keyword: &str) -> bool {
        !self.qualified && self.upper == keyword
    }

    pub fn is_clause(&self, keyword: &str) -> bool {
        self.depth == 0 && self.is(keyword)
    }
}

/// Bare words outside backtick identifiers, in order.
pub fn words(text: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut depth = 0usize;
    let mut in_ident = false;
    let mut last_significant: Option<char> = None;
    let mut current: Option<(usize, bool)> = None;

    let mut flush = |end: usize, current: &mut Option<(usize, bool)>, depth: usize| {
        if let Some((start, qualified)) = current.take() {
            words.push(Word {
                start,
                end,
                upper: text[start..end].to_ascii_uppercase(),
                depth,
                qualified,
            });
        }
    };

    for (i, c) in text.char_indices() {
        if in_ident {
            if c == '`' {
                in_ident = false;
                last_significant = Some('`');
            }
            continue;
        }
        let word_char = c.is_alphanumeric() || c == '_';
        if word_char {
            if current.is_none() {
                let qualified = matches!(last_significant, Some('.' | ':' | '$'));
                let starts_word = !c.is_ascii_digit();
                if starts_word {
                    current = Some((i, qualified));
                }
            }
            if current.is_some() {
                continue;
            }
        }
        flush(i, &mut current, depth);
        match c {
            '`' => in_ident = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if !c.is_whitespace() {
            last_significant = Some(c);
        }
    }
    flush(text.len(), &mut current, depth);
    words
}

/// Split at top-level occurrences of `sep`.
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_ident = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '`' => in_ident = !in_ident,
            _ if in_ident => {}
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Strip surrounding backticks from an identifier.
pub fn unquote(identifier: &str) -> String {
    let trimmed = identifier.trim();
    trimmed
        .strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
        .unwrap_or(trimmed)
        .to_string()
}
