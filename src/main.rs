mod background;
mod cli;
mod client;
mod clipboard;
mod collab;
mod content;
mod document;
mod exchange;
mod gesture;
mod history;
mod host;
mod intercept;
mod ipc;
mod selection;
mod settings;
mod simulate;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Background { store } => {
            if let Err(e) = background::run(store).await {
                tracing::error!(error = %e, "background failed");
                eprintln!("smartswap background: {e}");
                std::process::exit(1);
            }
        }
        Command::Client { action } => {
            if let Err(e) = client::run(action).await {
                tracing::error!(error = %e, "client failed");
                eprintln!("smartswap client: {e}");
                std::process::exit(1);
            }
        }
        Command::Simulate(args) => {
            if let Err(e) = simulate::run(args).await {
                tracing::error!(error = %e, "simulate failed");
                eprintln!("smartswap simulate: {e}");
                std::process::exit(1);
            }
        }
    }
}
