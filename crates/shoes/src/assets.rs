// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Stylesheet and script compilers, plus compiled-output housekeeping.
//!
//! Uses lightningcss for CSS and oxc for JavaScript. In development both
//! produce readable output; in production stylesheets are minified and
//! scripts are mangled and compressed.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use tracing::{debug, warn};

use crate::compiler::{Compile, CompilerSpec};
use crate::error::{Result, ShoesError};

/// Subdirectories of the compiled root that hold generated assets.
pub const COMPILED_SUBDIRS: [&str; 2] = ["js", "css"];

/// Compiles CSS with lightningcss.
#[derive(Debug, Clone, Copy, Default)]
pub struct StylesheetCompiler {
    /// Minify output.
    pub production: bool,
}

impl Compile for StylesheetCompiler {
    fn compile(&self, source: &str, path: &Path) -> Result<String> {
        let options = ParserOptions {
            filename: path.display().to_string(),
            ..ParserOptions::default()
        };
        let stylesheet = StyleSheet::parse(source, options)
            .map_err(|e| compile_error("css", path, format!("Css: {}", e)))?;
        let result = stylesheet
            .to_css(PrinterOptions {
                minify: self.production,
                ..PrinterOptions::default()
            })
            .map_err(|e| compile_error("css", path, format!("Css: {}", e)))?;
        Ok(result.code)
    }
}

/// Passes scripts through in development and minifies them with oxc in
/// production.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptCompiler {
    /// Mangle and compress output.
    pub production: bool,
}

impl Compile for ScriptCompiler {
    fn compile(&self, source: &str, path: &Path) -> Result<String> {
        if !self.production {
            return Ok(source.to_string());
        }

        let allocator = Allocator::default();
        // Classic script: top-level declarations are globals and must survive.
        let source_type = SourceType::script();
        let ret = Parser::new(&allocator, source, source_type).parse();
        if let Some(error) = ret.errors.first() {
            return Err(compile_error("js", path, format!("Js: {}", error)));
        }

        let mut program = ret.program;
        let options = MinifierOptions {
            mangle: Some(MangleOptions::default()),
            compress: Some(CompressOptions::smallest()),
        };
        let ret = Minifier::new(options).minify(&allocator, &mut program);
        let code = Codegen::new()
            .with_options(CodegenOptions {
                minify: true,
                comments: CommentOptions::disabled(),
                ..CodegenOptions::default()
            })
            .with_scoping(ret.scoping)
            .build(&program)
            .code;
        Ok(code)
    }
}

fn compile_error(compiler: &str, path: &Path, message: String) -> ShoesError {
    ShoesError::Compile {
        compiler: compiler.to_string(),
        path: path.display().to_string(),
        message,
    }
}

/// The stock compilers: `css` for stylesheets and `js` for scripts.
pub fn default_compilers(production: bool) -> Result<Vec<CompilerSpec>> {
    Ok(vec![
        CompilerSpec::new("css", r"\.css$", ".css", StylesheetCompiler { production })?,
        CompilerSpec::new("js", r"\.js$", ".js", ScriptCompiler { production })?,
    ])
}

/// Creates the compiled asset directories and empties them.
///
/// Output left over from a previous run may have been produced with
/// different settings, so every server start begins from scratch.
pub fn prepare_compiled_dirs(compiled_root: &Path) -> Result<()> {
    for subdir in COMPILED_SUBDIRS {
        let dir = compiled_root.join(subdir);
        fs::create_dir_all(&dir)?;
        clear_dir(&dir, subdir);
    }
    Ok(())
}

/// Removes everything inside `dir`, logging each removal. Errors are ignored.
pub fn clear_dir(dir: &Path, label: &str) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        if result.is_ok() {
            removed += 1;
            debug!(
                "Removed compiled file /{}/{}",
                label,
                entry.file_name().to_string_lossy()
            );
        }
    }
    removed
}

/// Deletes compiled output when the sources it came from change.
///
/// - a change to `public/js/<file>` deletes `compiled/js/<file>`
/// - a change anywhere under `public/css` deletes all of `compiled/css`,
///   since any stylesheet may be imported by any other
///
/// The next request for a deleted asset recompiles it.
pub struct HotReloader {
    #[allow(dead_code)]
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl HotReloader {
    /// Starts watching `public_dir/js` and `public_dir/css`.
    ///
    /// Relative directories are resolved against the current directory,
    /// since the watcher reports absolute event paths.
    pub fn start(public_dir: &Path, compiled_dir: &Path) -> Result<Self> {
        let public_dir = resolve_dir(public_dir)?;
        let compiled_dir = resolve_dir(compiled_dir)?;
        let js_src = public_dir.join("js");
        let css_src = public_dir.join("css");
        let js_out = compiled_dir.join("js");
        let css_out = compiled_dir.join("css");

        let (js_watch, css_watch) = (js_src.clone(), css_src.clone());
        let mut debouncer = new_debouncer(
            Duration::from_millis(200),
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let paths: Vec<PathBuf> =
                        events.iter().flat_map(|e| e.paths.iter().cloned()).collect();
                    invalidate(&paths, &js_src, &js_out, &css_src, &css_out);
                }
                Err(errors) => {
                    for error in errors {
                        warn!("Hot reload watch error: {}", error);
                    }
                }
            },
        )?;

        if js_watch.is_dir() {
            debouncer.watch(&js_watch, RecursiveMode::NonRecursive)?;
            debug!("Watching {} for changes", js_watch.display());
        }
        if css_watch.is_dir() {
            debouncer.watch(&css_watch, RecursiveMode::Recursive)?;
            debug!("Watching {} for changes", css_watch.display());
        }

        Ok(Self { debouncer })
    }
}

fn resolve_dir(dir: &Path) -> Result<PathBuf> {
    if dir.exists() {
        Ok(fs::canonicalize(dir)?)
    } else {
        Ok(std::path::absolute(dir)?)
    }
}

/// Applies the hot-reload rules to a batch of changed paths.
pub fn invalidate(
    changed: &[PathBuf],
    js_src: &Path,
    js_out: &Path,
    css_src: &Path,
    css_out: &Path,
) {
    let mut css_changed = false;

    for path in changed {
        if let Ok(relative) = path.strip_prefix(js_src) {
            let compiled = js_out.join(relative);
            debug!("Deleting {}", compiled.display());
            let _ = fs::remove_file(&compiled);
        } else if path.starts_with(css_src) {
            debug!("Changed stylesheet {}", path.display());
            css_changed = true;
        }
    }

    if css_changed {
        clear_dir(css_out, "css");
    }
}
