//! Asset and dependency types.

use fardel_common::{ContentHash, Environment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// The stable identity of an asset.
///
/// Derived from the file path and the hashes of content, transform config,
/// and environment, so the id is deterministic across runs and changes
/// exactly when any of those inputs change. Two files with identical
/// content at different paths are distinct assets.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(ContentHash);

impl AssetId {
    /// Derives an asset id from its identity inputs.
    pub fn new(
        file_path: &Path,
        content: ContentHash,
        config: ContentHash,
        env: ContentHash,
    ) -> Self {
        let path_hash = ContentHash::from_bytes(file_path.to_string_lossy().as_bytes());
        Self(ContentHash::combine(&[path_hash, content, config, env]))
    }

    /// Returns the underlying hash.
    pub fn hash(&self) -> ContentHash {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", self.0)
    }
}

/// The stable identity of a dependency edge request.
///
/// Derived from the resolving file, the module specifier, and the
/// environment, so re-discovering the same import produces the same id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyId(ContentHash);

impl DependencyId {
    /// Derives a dependency id from its identity inputs.
    pub fn new(source_path: Option<&Path>, specifier: &str, env: &Environment) -> Self {
        let source = source_path
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source_hash = ContentHash::from_bytes(source.as_bytes());
        let spec_hash = ContentHash::from_bytes(specifier.as_bytes());
        Self(ContentHash::combine(&[source_hash, spec_hash, env.hash()]))
    }
}

impl fmt::Display for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DependencyId({})", self.0)
    }
}

/// A single resolved, transformed unit of source content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Stable, content-derived identity.
    pub id: AssetId,
    /// The file this asset was created from.
    pub file_path: PathBuf,
    /// Post-transform type tag, e.g. `"js"` or `"css"`.
    pub asset_type: String,
    /// Current content after transformation.
    pub code: String,
    /// Source map produced by the transform, if any.
    pub source_map: Option<String>,
    /// Ordered dependencies discovered during transformation.
    pub dependencies: Vec<DependencyId>,
    /// Opaque key/value bag set by transformers, e.g. CSS-module exports.
    pub meta: BTreeMap<String, String>,
    /// The environment this asset was built for.
    pub env: Environment,
    /// Whether the asset comes from project source (as opposed to a
    /// third-party location).
    pub is_source: bool,
}

/// An edge request: a module specifier pending resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// Stable identity.
    pub id: DependencyId,
    /// The raw module specifier, e.g. `"./a.css"`.
    pub specifier: String,
    /// The file that declared this dependency; `None` for entries.
    pub source_path: Option<PathBuf>,
    /// The environment the resolved asset must be built for.
    pub env: Environment,
    /// Loaded asynchronously (dynamic import); starts a new bundle group.
    pub is_async: bool,
    /// A project entry point.
    pub is_entry: bool,
    /// Resolution failure is a warning, not an error.
    pub is_optional: bool,
    /// Referenced by URL rather than module import.
    pub is_url: bool,
}

impl Dependency {
    /// Creates a synchronous dependency declared by `source_path`.
    pub fn new(specifier: impl Into<String>, source_path: &Path, env: Environment) -> Self {
        let specifier = specifier.into();
        Self {
            id: DependencyId::new(Some(source_path), &specifier, &env),
            specifier,
            source_path: Some(source_path.to_path_buf()),
            env,
            is_async: false,
            is_entry: false,
            is_optional: false,
            is_url: false,
        }
    }

    /// Creates an entry-point dependency with no resolving source file.
    pub fn entry(specifier: impl Into<String>, env: Environment) -> Self {
        let specifier = specifier.into();
        Self {
            id: DependencyId::new(None, &specifier, &env),
            specifier,
            source_path: None,
            env,
            is_async: false,
            is_entry: true,
            is_optional: false,
            is_url: false,
        }
    }

    /// Marks this dependency as asynchronous.
    pub fn with_async(mut self) -> Self {
        self.is_async = true;
        self
    }

    /// Marks this dependency as optional.
    pub fn with_optional(mut self) -> Self {
        self.is_optional = true;
        self
    }
}
