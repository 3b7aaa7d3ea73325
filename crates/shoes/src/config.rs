// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Application configuration.
//!
//! [`AppConfig`] is the typed view of an environment's merged configuration
//! (see [`crate::environment::Environment::load_config`]). Only the keys the
//! server itself needs are typed; the full value is kept in
//! [`AppConfig::settings`] and exposed to views as `config`.
//!
//! # Example Configuration
//!
//! ```json
//! {
//!     "default": {
//!         "production": false,
//!         "static": "public",
//!         "compiled": "compiled",
//!         "views": "views",
//!         "site": { "name": "Example" }
//!     },
//!     "production": { "production": true }
//! }
//! ```

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Result, ShoesError};
use crate::utils::merge_defaults;

/// Typed server settings plus the raw configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Production mode: minified assets, cached views, terse errors.
    pub production: bool,
    /// Directory of static files and asset sources (default: "public").
    pub static_dir: String,
    /// Directory for compiled assets (default: "compiled").
    pub compiled_dir: String,
    /// Directory of view templates (default: "views").
    pub views_dir: String,
    /// The full merged configuration.
    pub settings: Arc<Value>,
}

#[derive(Deserialize)]
struct ServerKeys {
    #[serde(default)]
    production: bool,
    #[serde(rename = "static", default = "default_static_dir")]
    static_dir: String,
    #[serde(rename = "compiled", default = "default_compiled_dir")]
    compiled_dir: String,
    #[serde(rename = "views", default = "default_views_dir")]
    views_dir: String,
}

fn default_static_dir() -> String {
    "public".to_string()
}

fn default_compiled_dir() -> String {
    "compiled".to_string()
}

fn default_views_dir() -> String {
    "views".to_string()
}

impl AppConfig {
    /// Builds the config from a merged configuration value.
    ///
    /// # Errors
    ///
    /// Returns an error if a typed key has the wrong type.
    pub fn from_value(value: Value) -> Result<Self> {
        let value = merge_defaults(
            &value,
            &json!({
                "production": false,
                "static": default_static_dir(),
            }),
        );
        let keys: ServerKeys = serde_json::from_value(value.clone())
            .map_err(|e| ShoesError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            production: keys.production,
            static_dir: keys.static_dir,
            compiled_dir: keys.compiled_dir,
            views_dir: keys.views_dir,
            settings: Arc::new(value),
        })
    }

    /// Development defaults with no extra settings.
    pub fn development() -> Self {
        Self::from_value(json!({})).unwrap_or_else(|_| Self {
            production: false,
            static_dir: default_static_dir(),
            compiled_dir: default_compiled_dir(),
            views_dir: default_views_dir(),
            settings: Arc::new(json!({})),
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}
