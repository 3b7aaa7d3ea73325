// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Server assembly.
//!
//! [`Server`] takes the application's own axum routes and wraps them in the
//! standard stack. Everything up to and including the locals middleware
//! runs before routing, so URL rewrites and method overrides affect which
//! route is chosen.
//!
//! ```text
//! failure hooks         404 / 500 handling, error page
//!  └ panic catcher      handler panics become 500 failures
//!   └ request trace     trace!("GET /path")
//!    └ cache busting    /css/<nonce>/x.css -> /css/x.css
//!     └ asset compiler  recompile stale compiled/css, compiled/js
//!      └ method override
//!       └ UA redirects
//!        └ locals       views + per-request locals for Renderer
//!         └ router      app routes, then /favicon.ico
//!                       -> compiled/ -> public/ -> pages -> 404
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::handler::HandlerWithoutStateExt;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::Router;
use minijinja::Environment;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, trace, warn};

use crate::assets::{default_compilers, prepare_compiled_dirs, HotReloader};
use crate::cache_bust::{bust_cache, Nonce};
use crate::compiler::{compile_assets, AssetCompiler};
use crate::config::AppConfig;
use crate::error::{Failure, Result, ShoesError};
use crate::lifecycle::{self, Listen};
use crate::useragent::{redirect_useragents, UserAgentRedirects};
use crate::utils::panic_message;
use crate::views::{parse_cookies, Locals, Renderer, ViewConfigurator, Views};

/// Header carrying the real method of a tunnelled POST request.
pub const METHOD_OVERRIDE_HEADER: &str = "x-http-method-override";

/// The parts of a failed request that hooks get to see.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Request method.
    pub method: Method,
    /// Request URI (after cache-busting rewrites).
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
}

/// Hook for server errors. Returning `Some` replaces the default response.
pub type ErrorHook = Arc<dyn Fn(&Failure, &RequestInfo) -> Option<Response> + Send + Sync>;

/// Hook for not-found errors. Returning `Some` replaces the default response.
pub type NotFoundHook = Arc<dyn Fn(&RequestInfo) -> Option<Response> + Send + Sync>;

/// Builder for a shoes application.
pub struct Server {
    root: PathBuf,
    config: AppConfig,
    nonce: Nonce,
    redirects: UserAgentRedirects,
    view_helpers: Vec<ViewConfigurator>,
    error_hook: Option<ErrorHook>,
    not_found_hook: Option<NotFoundHook>,
    pages: bool,
    hot_reload: Option<bool>,
}

impl Server {
    /// Creates a server for the project at `root`.
    pub fn new(root: impl Into<PathBuf>, config: AppConfig) -> Self {
        Self {
            root: root.into(),
            config,
            nonce: Nonce::generate(),
            redirects: UserAgentRedirects::new(),
            view_helpers: Vec::new(),
            error_hook: None,
            not_found_hook: None,
            pages: false,
            hot_reload: None,
        }
    }

    /// Adds view helpers. Filters registered here override the defaults.
    pub fn view_helpers<F>(mut self, configure: F) -> Self
    where
        F: Fn(&mut Environment<'static>) + Send + Sync + 'static,
    {
        self.view_helpers.push(Arc::new(configure));
        self
    }

    /// Sets the server error (500) hook.
    pub fn error_handler<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Failure, &RequestInfo) -> Option<Response> + Send + Sync + 'static,
    {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    /// Sets the not found (404) hook.
    pub fn not_found_handler<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestInfo) -> Option<Response> + Send + Sync + 'static,
    {
        self.not_found_hook = Some(Arc::new(hook));
        self
    }

    /// Redirects user agents matching `pattern` (e.g. `MSIE [5-8]`) to
    /// `target` (e.g. `/upgrade`). When several rules match, the last one
    /// added wins.
    pub fn redirect_useragent(mut self, pattern: &str, target: impl Into<String>) -> Result<Self> {
        self.redirects.push(pattern, target)?;
        Ok(self)
    }

    /// Renders `views/<path>.html` for requests no route or file handles.
    ///
    /// Pages come last: app routes, the favicon and files under `compiled/`
    /// and `public/` all take precedence.
    pub fn pages(mut self, enabled: bool) -> Self {
        self.pages = enabled;
        self
    }

    /// Uses a fixed cache-busting nonce instead of a generated one.
    pub fn nonce(mut self, nonce: Nonce) -> Self {
        self.nonce = nonce;
        self
    }

    /// Forces hot reloading on or off. Defaults to on outside production.
    pub fn hot_reload(mut self, enabled: bool) -> Self {
        self.hot_reload = Some(enabled);
        self
    }

    /// Assembles the application around `routes`.
    ///
    /// Creates and empties the compiled asset directories and, unless
    /// disabled, starts the hot reloader.
    ///
    /// `routes` are matched first. `/favicon.ico` is served from
    /// `public/images/favicon.ico` only when `routes` has no route for it,
    /// and the static directories and pages follow after that. Any fallback
    /// already set on `routes` is replaced.
    pub fn create(self, routes: Router) -> Result<App> {
        let production = self.config.production;
        let public_dir = self.root.join(&self.config.static_dir);
        let compiled_dir = self.root.join(&self.config.compiled_dir);
        let views_dir = self.root.join(&self.config.views_dir);

        prepare_compiled_dirs(&compiled_dir)?;

        let views = Arc::new(Views::new(&views_dir, production));
        for configure in &self.view_helpers {
            views.configure(configure.as_ref());
        }

        let compiler = Arc::new(AssetCompiler::new(
            &public_dir,
            &compiled_dir,
            default_compilers(production)?,
        )?);

        let hot_reloader = if self.hot_reload.unwrap_or(!production) {
            Some(HotReloader::start(&public_dir, &compiled_dir)?)
        } else {
            None
        };

        let pages = self.pages;
        let fallback = move |view: Renderer, uri: Uri| async move { render_page(pages, &view, &uri) };
        let static_files = ServeDir::new(&compiled_dir)
            .call_fallback_on_method_not_allowed(true)
            .fallback(
                ServeDir::new(&public_dir)
                    .call_fallback_on_method_not_allowed(true)
                    .fallback(fallback.into_service()),
            );

        let favicon_and_files = Router::new()
            .route_service(
                "/favicon.ico",
                ServeFile::new(public_dir.join("images").join("favicon.ico")),
            )
            .fallback_service(static_files);
        let inner = routes.fallback_service(favicon_and_files);

        let hooks = Arc::new(Hooks {
            error: self.error_hook,
            not_found: self.not_found_hook,
            production,
        });
        let locals = Arc::new(LocalsState {
            views: views.clone(),
            nonce: self.nonce.clone(),
            config: self.config.clone(),
        });

        let stack = ServiceBuilder::new()
            .layer(middleware::from_fn_with_state(hooks, handle_failures))
            .layer(CatchPanicLayer::custom(panic_failure))
            .layer(middleware::from_fn(trace_requests))
            .layer(middleware::from_fn_with_state(self.nonce.clone(), bust_cache))
            .layer(middleware::from_fn_with_state(compiler.clone(), compile_assets))
            .layer(middleware::from_fn(override_method))
            .layer(middleware::from_fn_with_state(
                Arc::new(self.redirects),
                redirect_useragents,
            ))
            .layer(middleware::from_fn_with_state(locals, expose_locals))
            .service(inner);

        debug!(
            "Created app at {} (production: {}, nonce: {})",
            self.root.display(),
            production,
            self.nonce
        );

        Ok(App {
            router: Router::new().fallback_service(stack),
            nonce: self.nonce,
            views,
            compiler,
            root: self.root,
            _hot_reloader: hot_reloader,
        })
    }
}

/// An assembled application.
///
/// Keep it alive for as long as the server runs: it owns the hot reloader.
pub struct App {
    router: Router,
    nonce: Nonce,
    views: Arc<Views>,
    compiler: Arc<AssetCompiler>,
    root: PathBuf,
    _hot_reloader: Option<HotReloader>,
}

impl App {
    /// The axum router for the whole application.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The cache-busting nonce in use.
    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// The view environment.
    pub fn views(&self) -> &Arc<Views> {
        &self.views
    }

    /// The asset compiler.
    pub fn compiler(&self) -> &Arc<AssetCompiler> {
        &self.compiler
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serves the application until a shutdown signal arrives.
    pub async fn serve(self, listen: &Listen) -> Result<()> {
        lifecycle::serve(self.router.clone(), listen).await
    }
}

struct Hooks {
    error: Option<ErrorHook>,
    not_found: Option<NotFoundHook>,
    production: bool,
}

impl Hooks {
    fn respond(&self, failure: Failure, info: &RequestInfo) -> Response {
        if failure.not_found {
            if let Some(response) = self.not_found.as_ref().and_then(|hook| hook(info)) {
                return response;
            }
            return (StatusCode::NOT_FOUND, "Not Found").into_response();
        }

        warn!("Request error at {}: {}", info.uri, failure.message.trim());
        if let Some(detail) = &failure.detail {
            debug!("{}", detail);
        }

        if let Some(response) = self.error.as_ref().and_then(|hook| hook(&failure, info)) {
            return response;
        }

        if self.production {
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
        (StatusCode::INTERNAL_SERVER_ERROR, error_page(&failure)).into_response()
    }
}

async fn handle_failures(State(hooks): State<Arc<Hooks>>, request: Request, next: Next) -> Response {
    let info = RequestInfo {
        method: request.method().clone(),
        uri: request.uri().clone(),
        headers: request.headers().clone(),
    };

    let mut response = next.run(request).await;
    match response.extensions_mut().remove::<Failure>() {
        Some(failure) => hooks.respond(failure, &info),
        None => response,
    }
}

fn panic_failure(payload: Box<dyn std::any::Any + Send + 'static>) -> Response {
    Failure::server(
        format!("handler panicked: {}", panic_message(&*payload)),
        None,
    )
    .into_response()
}

async fn trace_requests(request: Request, next: Next) -> Response {
    trace!("{} {}", request.method(), request.uri());
    next.run(request).await
}

/// Lets clients tunnel PUT, PATCH and DELETE through POST.
async fn override_method(mut request: Request, next: Next) -> Response {
    if request.method() == Method::POST {
        let overridden = request
            .headers()
            .get(METHOD_OVERRIDE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Method::from_bytes(v.trim().to_ascii_uppercase().as_bytes()).ok());
        if let Some(method) = overridden {
            trace!("Method override {} -> {}", request.method(), method);
            *request.method_mut() = method;
        }
    }
    next.run(request).await
}

struct LocalsState {
    views: Arc<Views>,
    nonce: Nonce,
    config: AppConfig,
}

async fn expose_locals(
    State(state): State<Arc<LocalsState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookies = request
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(parse_cookies)
        .unwrap_or_default();
    let url = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let locals = Locals {
        url,
        method: request.method().to_string(),
        production: state.config.production,
        nonce: state.nonce.to_string(),
        cookies,
        config: state.config.settings.clone(),
    };
    request.extensions_mut().insert(state.views.clone());
    request.extensions_mut().insert(locals);
    next.run(request).await
}

fn render_page(enabled: bool, view: &Renderer, uri: &Uri) -> Result<Html<String>> {
    if !enabled {
        return Err(ShoesError::NotFound);
    }

    let path = uri.path().trim_start_matches('/');
    let name = if path.is_empty() {
        "index".to_string()
    } else if path.ends_with('/') {
        format!("{}index", path)
    } else {
        path.to_string()
    };

    if !view.exists(&name) {
        return Err(ShoesError::NotFound);
    }
    view.render(&name, serde_json::Value::Null)
}

fn error_page(failure: &Failure) -> Html<String> {
    let detail = failure
        .detail
        .as_deref()
        .map(|d| format!("\n\n{}", html_escape(d)))
        .unwrap_or_default();
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Error</title>
    <style>
        body {{ font-family: system-ui, sans-serif; padding: 2rem; background: #1a1a2e; color: #eee; }}
        .error {{ background: #16213e; border-left: 4px solid #e94560; padding: 1rem; border-radius: 4px; }}
        pre {{ background: #0f0f1a; padding: 1rem; overflow-x: auto; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>Error</h1>
    <div class="error">
        <pre>{}{}</pre>
    </div>
</body>
</html>"#,
        html_escape(&failure.message),
        detail
    ))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_page_escapes_message() {
        let page = error_page(&Failure::server("<script>", Some("a & b".to_string())));
        assert!(page.0.contains("&lt;script&gt;"));
        assert!(page.0.contains("a &amp; b"));
        assert!(!page.0.contains("<script>"));
    }

    #[test]
    fn test_production_hides_details() {
        let hooks = Hooks {
            error: None,
            not_found: None,
            production: true,
        };
        let info = RequestInfo {
            method: Method::GET,
            uri: Uri::from_static("/boom"),
            headers: HeaderMap::new(),
        };
        let response = hooks.respond(Failure::server("secret", None), &info);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_hook_can_decline() {
        let hooks = Hooks {
            error: None,
            not_found: Some(Arc::new(|_: &RequestInfo| -> Option<Response> { None })),
            production: false,
        };
        let info = RequestInfo {
            method: Method::GET,
            uri: Uri::from_static("/missing"),
            headers: HeaderMap::new(),
        };
        let response = hooks.respond(Failure::not_found(), &info);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
