//! `profileforge` - configuration profile composer and submitter
//!
//! Builds profiles from templates, validates and exports them, and submits
//! them to a device-management server.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};
use commands::App;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "profileforge=debug,profileforge_core=debug,profileforge_auth=debug,profileforge_profile=debug"
    } else {
        "profileforge=info,profileforge_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!("Starting profileforge {}", env!("CARGO_PKG_VERSION"));

    let app = App::open(cli.config.as_deref(), cli.db_path.as_deref()).await?;
    match cli.command {
        Commands::Account { command } => commands::account(&app, command).await,
        Commands::Probe { account } => commands::probe(&app, account).await,
        Commands::Connect(args) => commands::connect(&app, args).await,
        Commands::Logout { account } => commands::logout(&app, account).await,
        Commands::Validate(args) => commands::validate_profile(&app, &args),
        Commands::Export(args) => commands::export(&app, &args),
        Commands::Submit(args) => commands::submit(&app, &args).await,
    }
}
