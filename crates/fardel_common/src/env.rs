//! Target environment descriptors.

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The execution context an asset is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvContext {
    /// Code that runs in a browser.
    Browser,
    /// Code that runs under Node.
    Node,
}

/// A target environment: context plus minimum engine versions.
///
/// Environments participate in asset identity and cache keys: the same file
/// built for two different environments yields two distinct assets. Engine
/// versions are kept in a `BTreeMap` so the hash is independent of insertion
/// order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Where the output runs.
    pub context: EnvContext,
    /// Minimum supported engine versions, e.g. `"chrome" -> "90"`.
    #[serde(default)]
    pub engines: BTreeMap<String, String>,
}

impl Environment {
    /// A browser environment with no engine constraints.
    pub fn browser() -> Self {
        Self {
            context: EnvContext::Browser,
            engines: BTreeMap::new(),
        }
    }

    /// A Node environment with no engine constraints.
    pub fn node() -> Self {
        Self {
            context: EnvContext::Node,
            engines: BTreeMap::new(),
        }
    }

    /// Hashes this environment for use in asset ids and cache keys.
    pub fn hash(&self) -> ContentHash {
        let mut buf = format!("{:?}", self.context).into_bytes();
        for (engine, version) in &self.engines {
            buf.extend_from_slice(engine.as_bytes());
            buf.push(b'@');
            buf.extend_from_slice(version.as_bytes());
            buf.push(b';');
        }
        ContentHash::from_bytes(&buf)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.context {
            EnvContext::Browser => write!(f, "browser"),
            EnvContext::Node => write!(f, "node"),
        }
    }
}
