// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Server command.
//!
//! Serves the project's views as pages, with static files, compiled assets
//! and the standard error pages. Runs until SIGINT, SIGTERM, SIGQUIT or
//! SIGHUP, then removes the pid file.

use std::path::PathBuf;

use axum::Router;
use console::style;
use shoes::{Listen, Server};
use tracing::{debug, error};

use crate::project::Project;

/// Options for `shoes serve`.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Port, address or Unix socket path.
    pub listen: String,
    /// Config file, relative to the project root.
    pub config: Option<PathBuf>,
    /// Pid file to write while running.
    pub pid_file: Option<PathBuf>,
    /// Process title.
    pub title: Option<String>,
    /// Fail when the config has no section for the environment.
    pub strict: bool,
}

/// Runs the server until a shutdown signal arrives.
pub async fn run(project: &Project, options: ServeOptions) -> anyhow::Result<()> {
    let listen: Listen = options.listen.parse()?;
    let config = project.load_config(options.config.as_deref(), options.strict)?;
    let env = project.env();

    if let Some(title) = &options.title {
        env.process_title(title)?;
    }

    env.catch_panics(|message, stack| {
        error!("Uncaught panic: {}", message);
        if let Some(stack) = stack {
            debug!("{}", stack);
        }
    });

    let _pid_file = match &options.pid_file {
        Some(path) => Some(env.pid_file(project.root().join(path))?),
        None => None,
    };

    let production = config.production;
    let app = Server::new(project.root(), config)
        .pages(true)
        .create(Router::new())?;

    println!(
        "{} {} {}",
        style("Serving").green().bold(),
        style(project.root().display()).cyan(),
        style(format!(
            "on {} ({}{})",
            listen,
            env.name(),
            if production { ", production" } else { "" }
        ))
        .dim()
    );
    println!("  {} {}", style("Asset nonce:").dim(), app.nonce());

    app.serve(&listen).await?;
    println!("{}", style("Stopped").dim());
    Ok(())
}
