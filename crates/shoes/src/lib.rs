// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # shoes
//!
//! Web application scaffolding for axum.
//!
//! shoes wraps an application's own routes in the pieces every small site
//! ends up needing, and leaves routing, templating and minification to the
//! libraries that do them well.
//!
//! ## Features
//!
//! - Views rendered with minijinja, plus formatting filters
//! - Stylesheets and scripts compiled on first request, recompiled when stale
//! - Cache-busting asset URLs (`/css/<nonce>/site.css`)
//! - Hot reload of compiled assets in development
//! - User-agent redirects, method override, 404 and error hooks
//! - Environment-based config, pid files, process title, signal shutdown
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use axum::{routing::get, Router};
//! use shoes::{AppConfig, Environment, Renderer, Server};
//!
//! let env = Environment::new(None);
//! let config = AppConfig::from_value(env.load_config("config.json", false)?)?;
//!
//! let routes = Router::new().route("/", get(|view: Renderer| async move {
//!     view.render("index", serde_json::json!({ "title": "Home" }))
//! }));
//!
//! let app = Server::new(".", config).pages(true).create(routes)?;
//! app.serve(&"3000".parse()?).await?;
//! ```

/// Static assets: compilers, compiled directories, hot reload.
pub mod assets;
/// Cache-busting asset URLs.
pub mod cache_bust;
/// The compile-if-stale asset middleware.
pub mod compiler;
/// Typed application configuration.
pub mod config;
/// Named environments, config loading and process helpers.
pub mod environment;
/// Error types.
pub mod error;
/// View formatting helpers.
pub mod helpers;
/// Listening and signal-driven shutdown.
pub mod lifecycle;
/// Server assembly and failure handling.
pub mod server;
/// User-agent redirects.
pub mod useragent;
/// Hashing and config merging.
pub mod utils;
/// View rendering.
pub mod views;

pub use assets::{default_compilers, HotReloader, ScriptCompiler, StylesheetCompiler};
pub use cache_bust::Nonce;
pub use compiler::{AssetCompiler, Compile, CompileReport, CompilerSpec, Freshness};
pub use config::AppConfig;
pub use environment::{Environment, PidFile};
pub use error::{Failure, Result, ShoesError};
pub use lifecycle::{shutdown_signal, Listen};
pub use server::{App, RequestInfo, Server};
pub use useragent::UserAgentRedirects;
pub use views::{Locals, Renderer, Views};

// Re-export the template engine so view helpers can name its types.
pub use minijinja;
