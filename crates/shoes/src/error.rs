// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for shoes.
//!
//! [`ShoesError`] is returned by every fallible operation in the crate and
//! doubles as an axum response: handlers can return `Result<_, ShoesError>`
//! and the failure middleware in [`crate::server`] turns the error into a
//! 404 or 500 page, running the application's hooks on the way.
//!
//! # Error Categories
//!
//! - **Config errors**: unreadable, unparseable or unknown environments
//! - **Compile errors**: a stylesheet or script failed to compile
//! - **Template errors**: a view failed to load or render
//! - **Not found**: the distinguished 404 error

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// The main error type for shoes operations.
#[derive(Error, Debug)]
pub enum ShoesError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("Error parsing config: {0}")]
    ConfigParse(String),

    /// The configuration file has an extension we cannot read.
    #[error("Unsupported config format: {0}")]
    UnsupportedConfigFormat(String),

    /// Strict loading was requested and the environment has no section.
    #[error("Unknown config environment: {0}")]
    UnknownEnvironment(String),

    /// The merged configuration has the wrong shape.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The asset compiler was created without any compilers.
    #[error("compiler's \"enable\" option is not set, nothing will be compiled")]
    NoCompilersEnabled,

    /// A source asset failed to compile.
    #[error("{compiler} compile error in {path}: {message}")]
    Compile {
        /// Name of the compiler that failed (e.g. `css`).
        compiler: String,
        /// Source file being compiled.
        path: String,
        /// Compiler diagnostic.
        message: String,
    },

    /// A view failed to load or render.
    #[error("Template error in {template}: {message}")]
    Template {
        /// Template file name, including the `.html` suffix.
        template: String,
        /// Error reported by the template engine.
        message: String,
    },

    /// No route, static file or page matched the request.
    #[error("Not Found")]
    NotFound,

    /// The file watcher could not be set up.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// A user-agent or compiler pattern was not a valid regex.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Anything else that went wrong while handling a request.
    #[error("{0}")]
    Internal(String),
}

/// Convenience type alias for Results with [`ShoesError`].
pub type Result<T> = std::result::Result<T, ShoesError>;

/// A request failure carried in response extensions.
///
/// Responses produced from a [`ShoesError`] carry one of these so that the
/// outer failure middleware can run the not-found and error hooks with the
/// original message, regardless of where in the stack the error happened.
#[derive(Debug, Clone)]
pub struct Failure {
    /// Whether this is the distinguished not-found failure.
    pub not_found: bool,
    /// Short error message.
    pub message: String,
    /// Longer diagnostic (error chain or panic payload), if any.
    pub detail: Option<String>,
}

impl Failure {
    /// Creates the not-found failure.
    pub fn not_found() -> Self {
        Self {
            not_found: true,
            message: "Not Found".to_string(),
            detail: None,
        }
    }

    /// Creates a server failure with an optional detail.
    pub fn server(message: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            not_found: false,
            message: message.into(),
            detail,
        }
    }

    /// HTTP status the failure maps to when no hook intervenes.
    pub fn status(&self) -> StatusCode {
        if self.not_found {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Builds a bare response carrying this failure.
    pub fn into_response(self) -> Response {
        let mut response = (self.status(), self.message.clone()).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl From<&ShoesError> for Failure {
    fn from(err: &ShoesError) -> Self {
        match err {
            ShoesError::NotFound => Failure::not_found(),
            ShoesError::Compile { path, .. } => {
                Failure::server(err.to_string(), Some(format!("while compiling {}", path)))
            }
            ShoesError::Template { template, .. } => {
                Failure::server(err.to_string(), Some(format!("while rendering {}", template)))
            }
            other => Failure::server(other.to_string(), None),
        }
    }
}

impl IntoResponse for ShoesError {
    fn into_response(self) -> Response {
        Failure::from(&self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ShoesError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let failure = response.extensions().get::<Failure>().unwrap();
        assert!(failure.not_found);
    }

    #[test]
    fn test_compile_error_maps_to_500_with_detail() {
        let err = ShoesError::Compile {
            compiler: "css".to_string(),
            path: "public/css/site.css".to_string(),
            message: "Css: unexpected token".to_string(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let failure = response.extensions().get::<Failure>().unwrap();
        assert!(!failure.not_found);
        assert!(failure.message.contains("unexpected token"));
        assert_eq!(
            failure.detail.as_deref(),
            Some("while compiling public/css/site.css")
        );
    }
}
