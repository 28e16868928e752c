use anyhow::Result;
use clap::Command;
use tokio_util::sync::CancellationToken;

use musicpreneur::Config;

pub fn cmd() -> Command {
    Command::new("serve")
        .display_order(1)
        .about("Starts the web server")
}

/// Spawns the server task. The token is cancelled if the server stops on
/// its own, e.g. because the address couldn't be bound.
pub async fn run(config: Config, cancel: CancellationToken) -> Result<()> {
    tokio::spawn(async move {
        if let Err(e) = musicpreneur::axum::start(config).await {
            eprintln!("server failed: {e}");
        }
        cancel.cancel();
    });
    Ok(())
}
