// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Process environment: config loading, data modules and lifecycle helpers.
//!
//! An [`Environment`] is identified by name (`dev`, `production`, ...). The
//! name selects a section of the project's configuration file, and the
//! `default` section fills in whatever the selected section leaves out.
//!
//! # Example Configuration
//!
//! ```json
//! {
//!     "default": { "production": false, "site": { "name": "Example" } },
//!     "production": { "production": true }
//! }
//! ```
//!
//! Loading this file as `production` yields
//! `{ "production": true, "site": { "name": "Example" } }`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, ShoesError};
use crate::utils::{merge, panic_message};

/// Environment variable consulted when no environment name is given.
pub const ENV_VAR: &str = "SHOES_ENV";

/// Name used when neither an explicit name nor [`ENV_VAR`] is set.
pub const DEFAULT_ENV: &str = "default";

/// A named runtime environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    name: String,
}

impl Environment {
    /// Creates an environment.
    ///
    /// Falls back to `$SHOES_ENV`, then to `"default"`.
    pub fn new(name: Option<&str>) -> Self {
        let name = name
            .map(str::to_string)
            .or_else(|| std::env::var(ENV_VAR).ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| DEFAULT_ENV.to_string());
        Self { name }
    }

    /// The environment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loads the configuration section for this environment.
    ///
    /// The file must be `.json` or `.toml` and hold a table keyed by
    /// environment name. The returned value is this environment's section
    /// with the `default` section merged in underneath it.
    ///
    /// # Errors
    ///
    /// - the file cannot be read
    /// - the file cannot be parsed, or has another extension
    /// - `strict` is set and there is no section for this environment
    pub fn load_config(&self, path: impl AsRef<Path>, strict: bool) -> Result<Value> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let config: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| ShoesError::ConfigParse(e.to_string()))?,
            Some("toml") => {
                toml::from_str(&content).map_err(|e| ShoesError::ConfigParse(e.to_string()))?
            }
            _ => {
                return Err(ShoesError::UnsupportedConfigFormat(
                    path.display().to_string(),
                ))
            }
        };

        let Value::Object(mut sections) = config else {
            return Err(ShoesError::ConfigParse(
                "top level must be a table of environments".to_string(),
            ));
        };

        if strict && !sections.contains_key(&self.name) {
            return Err(ShoesError::UnknownEnvironment(self.name.clone()));
        }

        let mut selected = sections
            .remove(&self.name)
            .filter(Value::is_object)
            .unwrap_or_else(|| Value::Object(Map::new()));
        if let Some(defaults) = sections.get(DEFAULT_ENV) {
            merge(&mut selected, defaults);
        }

        debug!("Loaded config for environment '{}' from {}", self.name, path.display());
        Ok(selected)
    }

    /// Loads every `.json` document in `dir`, keyed by file stem.
    pub fn load_modules(&self, dir: impl AsRef<Path>) -> Result<BTreeMap<String, Value>> {
        let dir = dir.as_ref();
        let mut modules = BTreeMap::new();

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = fs::read_to_string(&path)?;
            let value: Value = serde_json::from_str(&content).map_err(|e| {
                ShoesError::ConfigParse(format!("{}: {}", path.display(), e))
            })?;
            modules.insert(name.to_string(), value);
        }

        Ok(modules)
    }

    /// Loads the modules in `dir` and calls `f` with each, collecting the
    /// results by module name.
    pub fn call_modules<R, F>(&self, dir: impl AsRef<Path>, mut f: F) -> Result<BTreeMap<String, R>>
    where
        F: FnMut(&str, &Value) -> R,
    {
        Ok(self
            .load_modules(dir)?
            .iter()
            .map(|(name, module)| (name.clone(), f(name, module)))
            .collect())
    }

    /// Installs a panic hook that reports every panic to `callback`.
    ///
    /// The callback receives the panic message and, when available, a
    /// backtrace (or at least the panic location).
    pub fn catch_panics<F>(&self, callback: F)
    where
        F: Fn(&str, Option<String>) + Send + Sync + 'static,
    {
        std::panic::set_hook(Box::new(move |info| {
            let message = panic_message(info.payload());
            let backtrace = std::backtrace::Backtrace::capture();
            let stack = match backtrace.status() {
                std::backtrace::BacktraceStatus::Captured => Some(backtrace.to_string()),
                _ => info
                    .location()
                    .map(|l| format!("at {}:{}:{}", l.file(), l.line(), l.column())),
            };
            callback(&message, stack);
        }));
    }

    /// Writes the current process id to `path`.
    ///
    /// The file is removed when the returned guard is dropped. Pair it with
    /// [`crate::lifecycle::shutdown_signal`] so that signal-driven exits
    /// unwind through the guard.
    pub fn pid_file(&self, path: impl AsRef<Path>) -> Result<PidFile> {
        PidFile::create(path)
    }

    /// Sets the process title.
    ///
    /// On Linux this is the kernel task name, which the kernel truncates to
    /// 15 bytes. Elsewhere it is a no-op.
    pub fn process_title(&self, title: &str) -> Result<()> {
        set_process_title(title)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(None)
    }
}

/// A pid file that removes itself on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Writes the current pid to `path`, replacing any stale file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::write(&path, std::process::id().to_string())?;
        debug!("Wrote pid file {}", path.display());
        Ok(Self { path })
    }

    /// Location of the pid file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed pid file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!("Could not remove pid file {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(target_os = "linux")]
fn set_process_title(title: &str) -> Result<()> {
    let name = std::ffi::CString::new(title)
        .map_err(|_| ShoesError::Internal("process title contains a NUL byte".to_string()))?;
    nix::sys::prctl::set_name(&name)
        .map_err(|e| ShoesError::Internal(format!("could not set process title: {}", e)))
}

#[cfg(not(target_os = "linux"))]
fn set_process_title(_title: &str) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_explicit_name_wins() {
        assert_eq!(Environment::new(Some("dev")).name(), "dev");
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "default: {}").unwrap();

        let err = Environment::new(Some("dev")).load_config(&path, false).unwrap_err();
        assert!(matches!(err, ShoesError::UnsupportedConfigFormat(_)));
    }

    #[test]
    fn test_toml_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[default]\nfoo = \"bar\"\n\n[default.obj]\nb = \"b\"\n\n[dev.obj]\na = \"a\"\n",
        )
        .unwrap();

        let config = Environment::new(Some("dev")).load_config(&path, true).unwrap();
        assert_eq!(config["foo"], "bar");
        assert_eq!(config["obj"]["a"], "a");
        assert_eq!(config["obj"]["b"], "b");
    }

    #[test]
    fn test_strict_unknown_environment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "default": { "foo": "bar" } }"#).unwrap();

        let err = Environment::new(Some("staging")).load_config(&path, true).unwrap_err();
        assert_eq!(err.to_string(), "Unknown config environment: staging");

        let lenient = Environment::new(Some("staging")).load_config(&path, false).unwrap();
        assert_eq!(lenient["foo"], "bar");
    }

    #[test]
    fn test_pid_file_removed_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.pid");

        let pid_file = Environment::new(Some("dev")).pid_file(&path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, std::process::id().to_string());
        assert_eq!(pid_file.path(), path.as_path());

        drop(pid_file);
        assert!(!path.exists());
    }
}
