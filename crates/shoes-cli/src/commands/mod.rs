// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `serve`: Serve the project until a shutdown signal
//! - `compile`: Compile every stylesheet and script ahead of time
//! - `clean`: Remove compiled output

/// Compiled output removal command.
pub mod clean;
/// Ahead-of-time asset compilation command.
pub mod compile;
/// Server command.
pub mod serve;
