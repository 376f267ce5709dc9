// Copyright 2026 Pitsync Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pitsync::cli;

#[derive(Parser)]
#[command(
    name = "pitsync",
    about = "Pitsync — weekly setup-package fetcher for TrackTitan",
    version,
    after_help = "Credentials come from PITSYNC_EMAIL / PITSYNC_PASSWORD (or a .env file).\nRun 'pitsync doctor' to check your environment."
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and download this week's active setup packages
    Fetch {
        /// Use the interactive Discord login instead of credentials
        #[arg(long)]
        discord: bool,
        /// Login email (defaults to PITSYNC_EMAIL)
        #[arg(long)]
        email: Option<String>,
        /// Download root (defaults to PITSYNC_DOWNLOAD_PATH or ~/Downloads)
        #[arg(long)]
        root: Option<PathBuf>,
        /// Team label for a "Garage 61 - <team>" folder inside each car directory
        #[arg(long)]
        team: Option<String>,
        /// Show the browser window instead of running headless
        #[arg(long)]
        visible: bool,
    },
    /// List Garage 61 team folders already present under the download root
    Teams {
        /// Download root (defaults to PITSYNC_DOWNLOAD_PATH or ~/Downloads)
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Check environment readiness (browser binary, download root, credentials)
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "pitsync=debug" } else { "pitsync=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.parse().expect("static directive")),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Fetch {
            discord,
            email,
            root,
            team,
            visible,
        } => cli::fetch_cmd::run(discord, email, root, team, visible).await,
        Commands::Teams { root } => cli::teams_cmd::run(root).await,
        Commands::Doctor => cli::doctor::run().await,
    };

    if let Err(e) = &result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    result
}
