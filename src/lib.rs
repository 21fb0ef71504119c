pub mod alerts;
pub mod api;
pub mod audio;
pub mod camera;
pub mod channel;
pub mod cli;
pub mod export;
pub mod models;
pub mod monitor;
pub mod render;
pub mod settings;
mod utils;

use anyhow::Context;
use clap::Parser;

pub fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging (reads RUST_LOG env var)
    let level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    log::debug!("drowsiness-monitor starting up...");

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(cli::execute(cli))
}
