// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Project location and configuration.
//!
//! A project is a directory holding `views/`, `public/` and an optional
//! config file. Without a config file the project runs with development
//! defaults.

use std::path::{Path, PathBuf};

use anyhow::Context;
use shoes::{AppConfig, Environment};
use tracing::debug;

/// Config files looked for when none is given explicitly.
pub const CONFIG_FILES: [&str; 2] = ["config.json", "config.toml"];

/// A shoes project on disk.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    env: Environment,
}

impl Project {
    /// Opens the project at `root` in the named environment (or the one
    /// from `$SHOES_ENV`).
    pub fn new(root: impl Into<PathBuf>, env: Option<&str>) -> Self {
        Self {
            root: root.into(),
            env: Environment::new(env),
        }
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The selected environment.
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Loads the project configuration.
    ///
    /// An explicit `config` path must exist. Otherwise the first of
    /// [`CONFIG_FILES`] present in the root is used, and when there is none
    /// the development defaults apply.
    pub fn load_config(&self, config: Option<&Path>, strict: bool) -> anyhow::Result<AppConfig> {
        let path = match config {
            Some(path) => Some(self.root.join(path)),
            None => CONFIG_FILES
                .iter()
                .map(|name| self.root.join(name))
                .find(|path| path.is_file()),
        };

        let Some(path) = path else {
            debug!("No config file in {}, using defaults", self.root.display());
            return Ok(AppConfig::development());
        };

        let value = self
            .env
            .load_config(&path, strict)
            .with_context(|| format!("loading {}", path.display()))?;
        Ok(AppConfig::from_value(value)?)
    }
}
