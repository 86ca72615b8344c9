//! Build option resolution.
//!
//! [`InitialOptions`] is the caller-facing option set with everything
//! optional; [`resolve_options`] fills in defaults, absolutizes paths, and
//! validates entries, producing the [`ResolvedOptions`] the rest of the
//! pipeline consumes.

use crate::error::ConfigError;
use fardel_common::Target;
use std::path::{Path, PathBuf};

/// Default cache directory name under the project root.
pub const DEFAULT_CACHE_DIR: &str = ".fardel-cache";

/// Default output directory name under the project root.
pub const DEFAULT_DIST_DIR: &str = "dist";

/// Caller-provided options for constructing a bundler instance.
#[derive(Clone, Debug, Default)]
pub struct InitialOptions {
    /// Entry point files, relative to the project root or absolute.
    pub entries: Vec<PathBuf>,
    /// Project root. Defaults to the common parent of the entries.
    pub project_root: Option<PathBuf>,
    /// Cache directory. Defaults to `<project_root>/.fardel-cache`.
    pub cache_dir: Option<PathBuf>,
    /// Output targets. Defaults to one browser target at `<project_root>/dist`.
    pub targets: Vec<Target>,
    /// Worker count. Defaults to available parallelism.
    pub workers: Option<usize>,
    /// Whether transform results are read from and written to the cache.
    pub use_cache: Option<bool>,
    /// Explicit config file path. Defaults to `<project_root>/fardel.toml`.
    pub config_path: Option<PathBuf>,
}

/// Fully resolved options consumed by the build pipeline.
#[derive(Clone, Debug)]
pub struct ResolvedOptions {
    /// Absolute entry point paths.
    pub entries: Vec<PathBuf>,
    /// Absolute project root.
    pub project_root: PathBuf,
    /// Absolute cache directory.
    pub cache_dir: PathBuf,
    /// Output targets with absolute dist directories.
    pub targets: Vec<Target>,
    /// Number of workers in the pool.
    pub workers: usize,
    /// Whether the content cache is consulted.
    pub use_cache: bool,
    /// Explicit config file path, when one was supplied.
    pub config_path: Option<PathBuf>,
}

/// Resolves initial options into the form the pipeline consumes.
///
/// Validates that at least one entry exists on disk. Relative paths are
/// resolved against the project root (or the current directory when no
/// root was given).
pub fn resolve_options(initial: &InitialOptions) -> Result<ResolvedOptions, ConfigError> {
    if initial.entries.is_empty() {
        return Err(ConfigError::NoEntries);
    }

    let cwd = std::env::current_dir()?;
    let project_root = match &initial.project_root {
        Some(root) => absolutize(&cwd, root),
        None => infer_project_root(&cwd, &initial.entries),
    };

    let mut entries = Vec::with_capacity(initial.entries.len());
    for entry in &initial.entries {
        let path = absolutize(&project_root, entry);
        if !path.exists() {
            return Err(ConfigError::MissingEntry(path));
        }
        entries.push(path);
    }

    let cache_dir = initial
        .cache_dir
        .as_ref()
        .map(|d| absolutize(&project_root, d))
        .unwrap_or_else(|| project_root.join(DEFAULT_CACHE_DIR));

    let targets = if initial.targets.is_empty() {
        vec![Target::new("default", project_root.join(DEFAULT_DIST_DIR))]
    } else {
        initial
            .targets
            .iter()
            .map(|t| {
                let mut t = t.clone();
                t.dist_dir = absolutize(&project_root, &t.dist_dir);
                t
            })
            .collect()
    };

    let workers = initial.workers.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });

    let config_path = initial
        .config_path
        .as_ref()
        .map(|p| absolutize(&project_root, p));

    Ok(ResolvedOptions {
        entries,
        project_root,
        cache_dir,
        targets,
        workers,
        use_cache: initial.use_cache.unwrap_or(true),
        config_path,
    })
}

/// Joins a relative path onto a base, leaving absolute paths unchanged.
fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Infers the project root as the parent directory of the first entry.
fn infer_project_root(cwd: &Path, entries: &[PathBuf]) -> PathBuf {
    entries
        .first()
        .map(|e| absolutize(cwd, e))
        .and_then(|e| e.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| cwd.to_path_buf())
}
