//! CLI entry point for the ontograph tool.

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use ontograph_access::Neo4jConnector;
use ontograph_cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling in-flight graph calls");
            on_interrupt.cancel();
        }
    });

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    ontograph_cli::run(cli, Arc::new(Neo4jConnector), stdin.lock(), &mut stdout, &cancel).await
}
