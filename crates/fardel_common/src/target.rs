//! Output target descriptors.

use crate::env::Environment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An output target: where bundles are written and for which environment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Target name, e.g. `"default"` or `"modern"`.
    pub name: String,
    /// Output directory for packaged bundles.
    pub dist_dir: PathBuf,
    /// The environment bundles in this target are built for.
    pub env: Environment,
}

impl Target {
    /// Creates a target with the given name and dist directory for a
    /// browser environment.
    pub fn new(name: impl Into<String>, dist_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dist_dir: dist_dir.into(),
            env: Environment::browser(),
        }
    }
}
