//! Ontograph CLI: run queries, inspect schemas, and manage per-ontology
//! connection overrides against a JSON registry.

pub mod args;
pub mod commands;
pub mod config;

pub use args::Cli;
pub use commands::run;
