// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Cache-busting asset URLs.
//!
//! Every server start picks a short nonce. Views reference assets as
//! `/css/<nonce>/site.css`; the middleware strips the nonce before the
//! request reaches the compiler and static file services, and rejects URLs
//! carrying a nonce from an earlier run so browsers never pair a new page
//! with a stale asset.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Request, State};
use axum::http::{StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use crate::utils::digest_hex;

lazy_static! {
    static ref ASSET_PATH: Regex = Regex::new(r"^/(css|js)/([^/]+)/(.+)$").unwrap();
}

/// What to do with a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Not a versioned asset URL; leave it alone.
    Pass,
    /// Versioned with the current nonce; serve this path instead.
    Rewrite(String),
    /// Versioned with some other nonce.
    Stale,
}

/// The per-process cache-busting token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    /// Generates a nonce from the current time.
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self(digest_hex(&millis.to_string())[..6].to_string())
    }

    /// Uses a fixed value, e.g. a release identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The nonce text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds a versioned URL for `file` of the given kind (`css` or `js`).
    pub fn asset_url(&self, kind: &str, file: &str) -> String {
        format!("/{}/{}/{}", kind, self.0, file.trim_start_matches('/'))
    }

    /// Classifies a request path.
    pub fn resolve(&self, path: &str) -> Resolution {
        let Some(captures) = ASSET_PATH.captures(path) else {
            return Resolution::Pass;
        };
        if &captures[2] != self.0.as_str() {
            return Resolution::Stale;
        }
        Resolution::Rewrite(format!("/{}/{}", &captures[1], &captures[3]))
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Axum middleware that strips the nonce from versioned asset URLs.
pub async fn bust_cache(State(nonce): State<Nonce>, mut request: Request, next: Next) -> Response {
    match nonce.resolve(request.uri().path()) {
        Resolution::Pass => {}
        Resolution::Stale => {
            trace!("Stale asset URL {}", request.uri());
            return (StatusCode::NOT_FOUND, "Not Found").into_response();
        }
        Resolution::Rewrite(path) => {
            if let Some(uri) = replace_path(request.uri(), &path) {
                *request.uri_mut() = uri;
            }
        }
    }
    next.run(request).await
}

fn replace_path(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse().ok()?);
    Uri::from_parts(parts).ok()
}
