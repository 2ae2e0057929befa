mod auth;
mod cli;
mod config;
mod cost;
mod error;
mod output;
mod providers;
mod store;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting actions-cost");
    cli.execute().await?;

    Ok(())
}
