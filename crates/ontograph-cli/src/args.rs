//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ontograph")]
#[command(about = "Query and inspect tenant ontology graphs")]
pub struct Cli {
    /// Config file prefix (default: ontograph).
    #[arg(short, long, default_value = "ontograph", global = true)]
    pub config: String,

    /// Registry file, overriding `cli.registry` from config.
    #[arg(long, global = true)]
    pub registry: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a read-only Cypher query and print the enriched result as JSON.
    Query {
        #[command(flatten)]
        target: Target,

        /// Maximum rows to return.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Cypher text.
        query: String,
    },

    /// Print the live schema of a graph as JSON.
    Schema {
        #[command(flatten)]
        target: Target,
    },

    /// Store a connection override for an ontology. Reads the password
    /// from the first line of stdin.
    SetConnection {
        #[arg(long)]
        tenant_id: Option<String>,

        #[arg(long)]
        ontology_id: String,

        /// bolt:// or neo4j:// URI, without credentials.
        #[arg(long)]
        uri: String,

        #[arg(long)]
        username: String,
    },

    /// Remove an ontology's connection override.
    ClearConnection {
        #[arg(long)]
        tenant_id: Option<String>,

        #[arg(long)]
        ontology_id: String,
    },

    /// Seal a password read from stdin for one ontology and print the blob.
    SealPassword {
        #[arg(long)]
        ontology_id: String,
    },

    /// Print a fresh base64 vault key.
    GenKey,
}

/// Which graph a command targets. An ontology wins over a workspace.
#[derive(Args, Debug, Clone, Default)]
pub struct Target {
    #[arg(long)]
    pub tenant_id: Option<String>,

    #[arg(long)]
    pub ontology_id: Option<String>,

    #[arg(long)]
    pub workspace_id: Option<String>,
}
