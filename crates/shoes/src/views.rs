// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! View rendering with minijinja.
//!
//! Views live in the project's `views/` directory as `<name>.html` files and
//! are rendered by name without the extension. Handlers get a [`Renderer`]
//! extractor that already knows the request's locals:
//!
//! ```rust,ignore
//! async fn about(view: Renderer) -> shoes::Result<Html<String>> {
//!     view.render("about", json!({ "title": "About us" }))
//! }
//! ```
//!
//! In production, loaded templates stay cached for the life of the process.
//! In development the cache is dropped before every render so edits show
//! up on the next request.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::Html;
use minijinja::{path_loader, Environment, Error as TemplateError, Value as TemplateValue};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use crate::error::{Result, ShoesError};
use crate::helpers;
use crate::utils::merge;

/// Configures the template environment, e.g. to add filters.
pub type ViewConfigurator = Arc<dyn Fn(&mut Environment<'static>) + Send + Sync>;

/// The template environment for a project.
pub struct Views {
    dir: PathBuf,
    production: bool,
    env: RwLock<Environment<'static>>,
}

impl Views {
    /// Creates views loading from `dir`, with the default helpers installed.
    pub fn new(dir: impl AsRef<Path>, production: bool) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let mut env = Environment::new();
        env.set_loader(path_loader(&dir));
        register_helpers(&mut env);
        Self {
            dir,
            production,
            env: RwLock::new(env),
        }
    }

    /// Runs `configure` against the environment. Filters it registers
    /// replace default helpers with the same name.
    pub fn configure(&self, configure: &dyn Fn(&mut Environment<'static>)) {
        let mut env = self.env.write().unwrap_or_else(|e| e.into_inner());
        configure(&mut env);
    }

    /// Returns true if `views/<name>.html` exists.
    pub fn exists(&self, name: &str) -> bool {
        !name.split('/').any(|s| s == ".." || s.is_empty())
            && self.dir.join(format!("{}.html", name)).is_file()
    }

    /// Renders `views/<name>.html` with `locals`.
    pub fn render(&self, name: &str, locals: &Value) -> Result<String> {
        let file = format!("{}.html", name);

        if !self.production {
            self.env
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .clear_templates();
        }

        let env = self.env.read().unwrap_or_else(|e| e.into_inner());
        let rendered = env
            .get_template(&file)
            .and_then(|template| template.render(TemplateValue::from_serialize(locals)));

        rendered.map_err(|e| {
            error!("Template error in {}", file);
            ShoesError::Template {
                template: file,
                message: describe(&e),
            }
        })
    }
}

fn describe(err: &TemplateError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(&format!(": {}", cause));
        source = cause.source();
    }
    message
}

fn register_helpers(env: &mut Environment<'static>) {
    env.add_filter("widow", widow_filter);
    env.add_filter("query", query_filter);
    env.add_filter("number_format", number_format_filter);
    env.add_filter("slug", slug_filter);
}

fn widow_filter(value: String) -> TemplateValue {
    TemplateValue::from_safe_string(helpers::widow(&value))
}

fn query_filter(url: String, params: TemplateValue) -> std::result::Result<String, TemplateError> {
    let mut pairs = Vec::new();
    if !params.is_undefined() && !params.is_none() {
        for key in params.try_iter()? {
            let value = params.get_item(&key)?;
            pairs.push((key.to_string(), value.to_string()));
        }
    }
    Ok(helpers::query(&url, &pairs))
}

fn number_format_filter(value: Option<TemplateValue>) -> String {
    let number = value.and_then(|v| match v.as_str() {
        Some(text) => helpers::parse_number(text),
        None => f64::try_from(v).ok(),
    });
    helpers::number_format(number)
}

fn slug_filter(value: String) -> String {
    helpers::slug(&value)
}

/// Per-request values exposed to every view.
#[derive(Debug, Clone, Serialize)]
pub struct Locals {
    /// Request path and query.
    pub url: String,
    /// Request method.
    pub method: String,
    /// Whether the app runs in production mode.
    pub production: bool,
    /// Cache-busting nonce for asset URLs.
    pub nonce: String,
    /// Request cookies.
    pub cookies: BTreeMap<String, String>,
    /// The merged application configuration.
    #[serde(skip)]
    pub config: Arc<Value>,
}

impl Locals {
    /// The locals as a JSON object, with the configuration under `config`.
    pub fn to_value(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        if let Value::Object(map) = &mut value {
            map.insert("config".to_string(), (*self.config).clone());
        }
        value
    }
}

/// Parses a `Cookie` header into name/value pairs.
pub fn parse_cookies(header: &str) -> BTreeMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                None
            } else {
                Some((name.to_string(), value.trim().trim_matches('"').to_string()))
            }
        })
        .collect()
}

/// Extractor that renders views with the current request's locals.
#[derive(Clone)]
pub struct Renderer {
    views: Arc<Views>,
    locals: Locals,
}

impl Renderer {
    /// The request's locals.
    pub fn locals(&self) -> &Locals {
        &self.locals
    }

    /// Returns true if `views/<name>.html` exists.
    pub fn exists(&self, name: &str) -> bool {
        self.views.exists(name)
    }

    /// Renders `views/<name>.html`.
    ///
    /// `locals` must be a JSON object (or null); its keys take precedence
    /// over the request locals.
    pub fn render(&self, name: &str, locals: Value) -> Result<Html<String>> {
        let mut context = match locals {
            Value::Null => json!({}),
            value @ Value::Object(_) => value,
            _ => {
                return Err(ShoesError::Internal(format!(
                    "locals for view '{}' must be an object",
                    name
                )))
            }
        };
        merge(&mut context, &self.locals.to_value());
        self.views.render(name, &context).map(Html)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Renderer
where
    S: Send + Sync,
{
    type Rejection = ShoesError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let views = parts
            .extensions
            .get::<Arc<Views>>()
            .cloned()
            .ok_or_else(|| ShoesError::Internal("views are not configured".to_string()))?;
        let locals = parts
            .extensions
            .get::<Locals>()
            .cloned()
            .ok_or_else(|| ShoesError::Internal("request locals are missing".to_string()))?;
        Ok(Self { views, locals })
    }
}
