// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shoes_cli::commands;
use shoes_cli::commands::serve::ServeOptions;
use shoes_cli::project::Project;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shoes")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Serve and maintain shoes web projects", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Project root
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Environment name (defaults to $SHOES_ENV, then "default")
    #[arg(short, long, global = true)]
    env: Option<String>,

    /// Config file relative to the project root
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the project
    Serve {
        /// Port, address or Unix socket path to listen on
        #[arg(short, long, default_value = "3000")]
        listen: String,
        /// Write the process id to this file while running
        #[arg(long)]
        pid_file: Option<PathBuf>,
        /// Process title
        #[arg(long)]
        title: Option<String>,
        /// Fail if the config has no section for the environment
        #[arg(long)]
        strict: bool,
    },
    /// Compile every stylesheet and script ahead of time
    Compile,
    /// Remove compiled assets
    Clean,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let project = Project::new(cli.root, cli.env.as_deref());

    match cli.command {
        Commands::Serve {
            listen,
            pid_file,
            title,
            strict,
        } => {
            commands::serve::run(
                &project,
                ServeOptions {
                    listen,
                    config: cli.config,
                    pid_file,
                    title,
                    strict,
                },
            )
            .await
        }
        Commands::Compile => commands::compile::run(&project, cli.config.as_deref()).await,
        Commands::Clean => commands::clean::run(&project, cli.config.as_deref()),
    }
}
