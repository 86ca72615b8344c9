//! Error types for the build pipeline.

use std::path::PathBuf;

use fardel_bundle::BundleError;
use fardel_cache::CacheError;
use fardel_config::ConfigError;
use fardel_workers::WorkerError;

/// Errors produced by a build pass.
///
/// A fatal error aborts the current pass only; in watch mode the previous
/// asset graph stays live and the next filesystem event triggers a fresh
/// pass. `Aborted` is special: it is never reported, because the pass that
/// raised it is immediately superseded by another.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A module specifier could not be resolved to a file.
    #[error("failed to resolve '{specifier}' from {from}")]
    Resolution {
        /// The unresolved module specifier.
        specifier: String,
        /// The file (or entry context) the specifier was imported from.
        from: PathBuf,
    },

    /// A transformer rejected its input.
    #[error("failed to transform {path}: {message}")]
    Transform {
        /// The file being transformed.
        path: PathBuf,
        /// Transformer failure description.
        message: String,
    },

    /// A packager rejected its bundle.
    #[error("failed to package bundle '{bundle}': {message}")]
    Package {
        /// The bundle's output name.
        bundle: String,
        /// Packager failure description.
        message: String,
    },

    /// The pass was aborted because a newer build superseded it.
    #[error("build aborted")]
    Aborted,

    /// A worker pool failure (crash after retry, shutdown race).
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// Configuration loading or option resolution failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The bundling policy produced a structurally invalid bundle graph.
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// The content cache failed in a non-recoverable way.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// An I/O error outside the cache (reading sources, writing output).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Returns `true` for the abort pseudo-error, which is retried
    /// silently rather than reported.
    pub fn is_abort(&self) -> bool {
        matches!(self, BuildError::Aborted)
    }
}
