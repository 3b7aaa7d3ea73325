// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! shoes CLI library.
//!
//! Commands for running and maintaining a shoes project from the shell.
//!
//! # Usage
//!
//! This crate is primarily used through the `shoes` binary:
//!
//! ```bash
//! shoes serve --listen 3000      # Serve views/ as pages
//! shoes --env production compile # Precompile public/css and public/js
//! shoes clean                    # Empty compiled/
//! ```
//!
//! # Configuration
//!
//! Projects are configured via `config.json` (or `config.toml`) at the
//! project root, keyed by environment name.

/// CLI commands (serve, compile, clean).
pub mod commands;
/// Project location and configuration.
pub mod project;
