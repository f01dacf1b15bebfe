//! vigil-server: runs scheduled alert jobs and exposes the `/watcher` control API.

mod api;
mod cli;
mod db;
mod job_store;
mod router;
mod startup;
mod state;

use clap::Parser;

use crate::cli::{Cli, Command};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vigil_core::config::load_dotenv();
    init_tracing();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let config = vigil_core::Config::from_env();
            startup::serve(config).await
        }
        Command::Validate { file, count } => cli::validate(&file, count),
    }
}
