// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! On-demand asset compilation.
//!
//! [`AssetCompiler`] maps request paths to source files through a list of
//! [`CompilerSpec`]s. When a GET request arrives for a compiled asset, the
//! source and destination modification times are compared and the source is
//! recompiled if the destination is missing or older. Serving the file is
//! left to the static file service further down the stack.
//!
//! ```text
//! GET /css/site.css
//!   src:  public/css/site.css    (pattern \.css$ replaced by source ext)
//!   dest: compiled/css/site.css
//! ```
//!
//! Compiles of the same destination are serialised, so concurrent requests
//! for a stale asset compile it once and never interleave writes.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use regex::Regex;
use tracing::{debug, trace};

use crate::error::{Result, ShoesError};

/// A source-to-output compiler.
pub trait Compile: Send + Sync {
    /// Compiles `source`, read from `path`, into the output text.
    fn compile(&self, source: &str, path: &Path) -> Result<String>;
}

impl<F> Compile for F
where
    F: Fn(&str, &Path) -> Result<String> + Send + Sync,
{
    fn compile(&self, source: &str, path: &Path) -> Result<String> {
        self(source, path)
    }
}

/// Associates a URL suffix pattern with a compiler.
#[derive(Clone)]
pub struct CompilerSpec {
    /// Compiler name, used in errors and logs.
    pub name: String,
    /// Pattern matched against the request path, e.g. `\.css$`.
    pub pattern: Regex,
    /// Replacement for the matched suffix that yields the source path.
    pub source_ext: String,
    /// The compiler itself.
    pub compiler: Arc<dyn Compile>,
}

impl CompilerSpec {
    /// Creates a compiler spec.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        source_ext: impl Into<String>,
        compiler: impl Compile + 'static,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
            source_ext: source_ext.into(),
            compiler: Arc::new(compiler),
        })
    }

    /// Returns true if this spec handles `url_path`.
    pub fn matches(&self, url_path: &str) -> bool {
        self.pattern.is_match(url_path)
    }

    /// Resolves the source file for `url_path` under `src_dir`.
    pub fn source_path(&self, src_dir: &Path, url_path: &str) -> PathBuf {
        let replaced = self.pattern.replace(url_path, self.source_ext.as_str());
        src_dir.join(replaced.trim_start_matches('/'))
    }
}

impl std::fmt::Debug for CompilerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerSpec")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .field("source_ext", &self.source_ext)
            .finish()
    }
}

/// Outcome of a freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No compiler handles the path.
    Unmatched,
    /// A compiler matched but the source file does not exist.
    NoSource,
    /// The compiled file is up to date.
    Fresh,
    /// The source was (re)compiled.
    Compiled,
}

/// Counts from compiling a whole source tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompileReport {
    /// Files compiled during this run.
    pub compiled: usize,
    /// Files whose output was already current.
    pub fresh: usize,
}

/// Compiles assets from `src_dir` into `dest_dir` when they are stale.
pub struct AssetCompiler {
    src_dir: PathBuf,
    dest_dir: PathBuf,
    specs: Vec<CompilerSpec>,
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl AssetCompiler {
    /// Creates an asset compiler.
    ///
    /// # Errors
    ///
    /// Returns [`ShoesError::NoCompilersEnabled`] if `specs` is empty.
    pub fn new(
        src_dir: impl Into<PathBuf>,
        dest_dir: impl Into<PathBuf>,
        specs: Vec<CompilerSpec>,
    ) -> Result<Self> {
        if specs.is_empty() {
            return Err(ShoesError::NoCompilersEnabled);
        }
        Ok(Self {
            src_dir: src_dir.into(),
            dest_dir: dest_dir.into(),
            specs,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Source directory.
    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    /// Destination directory.
    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// Makes sure the compiled file for `url_path` is at least as new as its
    /// source, compiling it if needed.
    pub async fn ensure_fresh(&self, url_path: &str) -> Result<Freshness> {
        if !is_safe_path(url_path) {
            return Ok(Freshness::Unmatched);
        }
        let Some(spec) = self.specs.iter().find(|s| s.matches(url_path)) else {
            return Ok(Freshness::Unmatched);
        };

        let src = spec.source_path(&self.src_dir, url_path);
        let dest = self.dest_dir.join(url_path.trim_start_matches('/'));

        if modified(&src).await?.is_none() {
            return Ok(Freshness::NoSource);
        }

        let lock = self.lock_for(&dest);
        let _guard = lock.lock().await;

        // Re-check under the lock: another request may have just compiled it.
        let Some(src_mtime) = modified(&src).await? else {
            return Ok(Freshness::NoSource);
        };
        if let Some(dest_mtime) = modified(&dest).await? {
            if src_mtime <= dest_mtime {
                return Ok(Freshness::Fresh);
            }
        }

        self.compile(spec, &src, &dest).await?;
        Ok(Freshness::Compiled)
    }

    /// Compiles every stale source under `src_dir/subdir`.
    ///
    /// Request paths are derived from the relative file paths, so this only
    /// reaches sources whose extension maps back onto itself (as the default
    /// `css` and `js` compilers do).
    pub async fn compile_tree(&self, subdir: &str) -> Result<CompileReport> {
        let root = self.src_dir.join(subdir);
        let mut files = Vec::new();
        if root.is_dir() {
            collect_files(&root, &mut files)?;
        }
        files.sort();

        let mut report = CompileReport::default();
        for file in files {
            let Ok(relative) = file.strip_prefix(&self.src_dir) else {
                continue;
            };
            let url_path = format!("/{}", relative.to_string_lossy().replace('\\', "/"));
            match self.ensure_fresh(&url_path).await? {
                Freshness::Compiled => report.compiled += 1,
                Freshness::Fresh => report.fresh += 1,
                Freshness::Unmatched | Freshness::NoSource => {}
            }
        }
        Ok(report)
    }

    fn lock_for(&self, dest: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(dest.to_path_buf()).or_default().clone()
    }

    async fn compile(&self, spec: &CompilerSpec, src: &Path, dest: &Path) -> Result<()> {
        let source = tokio::fs::read_to_string(src).await?;

        let compiler = spec.compiler.clone();
        let src_path = src.to_path_buf();
        let output = tokio::task::spawn_blocking(move || compiler.compile(&source, &src_path))
            .await
            .map_err(|e| ShoesError::Internal(format!("compiler task failed: {}", e)))?
            .map_err(|e| match e {
                err @ ShoesError::Compile { .. } => err,
                other => ShoesError::Compile {
                    compiler: spec.name.clone(),
                    path: src.display().to_string(),
                    message: other.to_string(),
                },
            })?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, output).await?;
        debug!("Compiled {} -> {} ({})", src.display(), dest.display(), spec.name);
        Ok(())
    }
}

/// Axum middleware that refreshes compiled assets before they are served.
pub async fn compile_assets(
    State(compiler): State<Arc<AssetCompiler>>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return next.run(request).await;
    }

    match compiler.ensure_fresh(request.uri().path()).await {
        Ok(freshness) => {
            trace!("{} -> {:?}", request.uri().path(), freshness);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

async fn modified(path: &Path) -> Result<Option<SystemTime>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(meta.modified()?)),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn is_safe_path(url_path: &str) -> bool {
    url_path.starts_with('/')
        && Path::new(url_path.trim_start_matches('/'))
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    fn upper_spec(counter: Arc<AtomicUsize>) -> CompilerSpec {
        CompilerSpec::new("upper", r"\.txt$", ".src", move |source: &str, _: &Path| -> Result<String> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(source.to_uppercase())
        })
        .unwrap()
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }

    #[test]
    fn test_requires_compilers() {
        let err = AssetCompiler::new("public", "compiled", Vec::new()).err().unwrap();
        assert!(matches!(err, ShoesError::NoCompilersEnabled));
    }

    #[test]
    fn test_source_path_replaces_suffix() {
        let spec = CompilerSpec::new("less", r"\.css$", ".less", |s: &str, _: &Path| -> Result<String> {
            Ok(s.to_string())
        })
        .unwrap();
        assert!(spec.matches("/css/site.css"));
        assert!(!spec.matches("/js/app.js"));
        assert_eq!(
            spec.source_path(Path::new("public"), "/css/site.css"),
            PathBuf::from("public/css/site.less")
        );
    }

    #[tokio::test]
    async fn test_compiles_missing_then_fresh() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("public");
        let dest = dir.path().join("compiled");
        fs::create_dir_all(src.join("docs")).unwrap();
        fs::write(src.join("docs/readme.src"), "hello").unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let compiler = AssetCompiler::new(&src, &dest, vec![upper_spec(count.clone())]).unwrap();

        assert_eq!(compiler.ensure_fresh("/docs/readme.txt").await.unwrap(), Freshness::Compiled);
        assert_eq!(fs::read_to_string(dest.join("docs/readme.txt")).unwrap(), "HELLO");

        assert_eq!(compiler.ensure_fresh("/docs/readme.txt").await.unwrap(), Freshness::Fresh);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recompiles_when_source_is_newer() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("public");
        let dest = dir.path().join("compiled");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dest).unwrap();
        fs::write(src.join("note.src"), "new").unwrap();
        fs::write(dest.join("note.txt"), "OLD").unwrap();

        let now = SystemTime::now();
        set_mtime(&dest.join("note.txt"), now - Duration::from_secs(60));
        set_mtime(&src.join("note.src"), now);

        let count = Arc::new(AtomicUsize::new(0));
        let compiler = AssetCompiler::new(&src, &dest, vec![upper_spec(count)]).unwrap();

        assert_eq!(compiler.ensure_fresh("/note.txt").await.unwrap(), Freshness::Compiled);
        assert_eq!(fs::read_to_string(dest.join("note.txt")).unwrap(), "NEW");
    }

    #[tokio::test]
    async fn test_keeps_newer_output() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("public");
        let dest = dir.path().join("compiled");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dest).unwrap();
        fs::write(src.join("note.src"), "source").unwrap();
        fs::write(dest.join("note.txt"), "hand edited").unwrap();

        let now = SystemTime::now();
        set_mtime(&src.join("note.src"), now - Duration::from_secs(60));
        set_mtime(&dest.join("note.txt"), now);

        let count = Arc::new(AtomicUsize::new(0));
        let compiler = AssetCompiler::new(&src, &dest, vec![upper_spec(count.clone())]).unwrap();

        assert_eq!(compiler.ensure_fresh("/note.txt").await.unwrap(), Freshness::Fresh);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(fs::read_to_string(dest.join("note.txt")).unwrap(), "hand edited");
    }

    #[tokio::test]
    async fn test_missing_source_and_unmatched() {
        let dir = tempdir().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let compiler = AssetCompiler::new(
            dir.path().join("public"),
            dir.path().join("compiled"),
            vec![upper_spec(count)],
        )
        .unwrap();

        assert_eq!(compiler.ensure_fresh("/missing.txt").await.unwrap(), Freshness::NoSource);
        assert_eq!(compiler.ensure_fresh("/image.png").await.unwrap(), Freshness::Unmatched);
        assert_eq!(
            compiler.ensure_fresh("/../secret.txt").await.unwrap(),
            Freshness::Unmatched
        );
    }

    #[tokio::test]
    async fn test_compile_error_is_reported() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("public");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("bad.src"), "x").unwrap();

        let failing = CompilerSpec::new("fail", r"\.txt$", ".src", |_: &str, _: &Path| -> Result<String> {
            Err(ShoesError::Internal("boom".to_string()))
        })
        .unwrap();
        let compiler = AssetCompiler::new(&src, dir.path().join("compiled"), vec![failing]).unwrap();

        let err = compiler.ensure_fresh("/bad.txt").await.unwrap_err();
        match err {
            ShoesError::Compile { compiler, message, .. } => {
                assert_eq!(compiler, "fail");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("compiled/bad.txt").exists());
    }

    #[tokio::test]
    async fn test_concurrent_requests_compile_once() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("public");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("shared.src"), "shared").unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let compiler = Arc::new(
            AssetCompiler::new(&src, dir.path().join("compiled"), vec![upper_spec(count.clone())])
                .unwrap(),
        );

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let compiler = compiler.clone();
                tokio::spawn(async move { compiler.ensure_fresh("/shared.txt").await.unwrap() })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_compile_tree() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("public");
        fs::create_dir_all(src.join("docs/nested")).unwrap();
        fs::write(src.join("docs/a.txt"), "a").unwrap();
        fs::write(src.join("docs/nested/b.txt"), "b").unwrap();
        fs::write(src.join("docs/c.png"), "c").unwrap();

        let spec = CompilerSpec::new("upper", r"\.txt$", ".txt", |s: &str, _: &Path| -> Result<String> {
            Ok(s.to_uppercase())
        })
        .unwrap();
        let compiler = AssetCompiler::new(&src, dir.path().join("compiled"), vec![spec]).unwrap();

        let report = compiler.compile_tree("docs").await.unwrap();
        assert_eq!(report, CompileReport { compiled: 2, fresh: 0 });
        assert_eq!(
            fs::read_to_string(dir.path().join("compiled/docs/nested/b.txt")).unwrap(),
            "B"
        );

        let again = compiler.compile_tree("docs").await.unwrap();
        assert_eq!(again, CompileReport { compiled: 0, fresh: 2 });
    }
}
