// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! User-agent based redirects (e.g. sending old browsers to `/upgrade`).

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use regex::Regex;

use crate::error::Result;

/// Ordered list of user-agent redirect rules.
#[derive(Debug, Clone, Default)]
pub struct UserAgentRedirects {
    rules: Vec<(Regex, String)>,
}

impl UserAgentRedirects {
    /// Creates an empty rule list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule redirecting user agents matching `pattern` to `target`.
    pub fn push(&mut self, pattern: &str, target: impl Into<String>) -> Result<()> {
        self.rules.push((Regex::new(pattern)?, target.into()));
        Ok(())
    }

    /// Returns true if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Target of the last rule matching `user_agent`.
    pub fn resolve(&self, user_agent: &str) -> Option<&str> {
        self.rules
            .iter()
            .rev()
            .find(|(pattern, _)| pattern.is_match(user_agent))
            .map(|(_, target)| target.as_str())
    }
}

/// Axum middleware applying [`UserAgentRedirects`].
///
/// Requests already at the redirect target pass through, so the target page
/// itself stays reachable.
pub async fn redirect_useragents(
    State(redirects): State<Arc<UserAgentRedirects>>,
    request: Request,
    next: Next,
) -> Response {
    let target = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .and_then(|ua| redirects.resolve(ua));

    match target {
        Some(target) if target != request.uri().path() => {
            let Ok(location) = HeaderValue::from_str(target) else {
                return next.run(request).await;
            };
            (
                StatusCode::FOUND,
                [
                    (header::LOCATION, location),
                    (
                        header::HeaderName::from_static("x-accel-expires"),
                        HeaderValue::from_static("0"),
                    ),
                ],
            )
                .into_response()
        }
        _ => next.run(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_matching_rule_wins() {
        let mut redirects = UserAgentRedirects::new();
        redirects.push(r"MSIE [5-8]", "/upgrade").unwrap();
        redirects.push(r"MSIE 6", "/ie6").unwrap();

        assert_eq!(redirects.resolve("Mozilla/4.0 (compatible; MSIE 6.0)"), Some("/ie6"));
        assert_eq!(redirects.resolve("Mozilla/4.0 (compatible; MSIE 7.0)"), Some("/upgrade"));
        assert_eq!(redirects.resolve("Mozilla/5.0 Firefox/120.0"), None);
    }

    #[test]
    fn test_invalid_pattern() {
        let mut redirects = UserAgentRedirects::new();
        assert!(redirects.push(r"MSIE [5-", "/upgrade").is_err());
        assert!(redirects.is_empty());
    }
}
