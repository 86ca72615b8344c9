//! Bundler configuration parsed from `fardel.toml`.
//!
//! The configuration is a capability registry: it maps file extensions to
//! transformer pipelines and output type tags to packager names. Plugin
//! names are resolved to implementations once per build by the core's
//! plugin registry, not at dispatch time.

use crate::error::ConfigError;
use fardel_common::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// The bundler configuration parsed from `fardel.toml`.
///
/// Maps are `BTreeMap`s so the configuration hash is independent of
/// declaration order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BundlerConfig {
    /// Transformer pipelines by file extension, e.g. `js = ["transformer-js"]`.
    #[serde(default)]
    pub transformers: BTreeMap<String, Vec<String>>,

    /// Packager names by output type tag, e.g. `css = "packager-css"`.
    #[serde(default)]
    pub packagers: BTreeMap<String, String>,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        let mut transformers = BTreeMap::new();
        transformers.insert("js".to_string(), vec!["transformer-js".to_string()]);
        transformers.insert("json".to_string(), vec!["transformer-json".to_string()]);
        transformers.insert("css".to_string(), vec!["transformer-css".to_string()]);

        let mut packagers = BTreeMap::new();
        packagers.insert("js".to_string(), "packager-js".to_string());
        packagers.insert("css".to_string(), "packager-css".to_string());

        Self {
            transformers,
            packagers,
        }
    }
}

impl BundlerConfig {
    /// Returns the transformer pipeline for a file extension, if configured.
    pub fn pipeline_for(&self, extension: &str) -> Option<&[String]> {
        self.transformers.get(extension).map(|p| p.as_slice())
    }

    /// Returns the packager name for an output type tag, if configured.
    pub fn packager_for(&self, asset_type: &str) -> Option<&str> {
        self.packagers.get(asset_type).map(|s| s.as_str())
    }

    /// Hashes this configuration for use in asset ids and cache keys.
    ///
    /// Any configuration change invalidates every cached transform result.
    pub fn hash(&self) -> ContentHash {
        let mut buf = Vec::new();
        for (ext, pipeline) in &self.transformers {
            buf.extend_from_slice(ext.as_bytes());
            buf.push(b'=');
            for name in pipeline {
                buf.extend_from_slice(name.as_bytes());
                buf.push(b',');
            }
            buf.push(b';');
        }
        for (tag, packager) in &self.packagers {
            buf.extend_from_slice(tag.as_bytes());
            buf.push(b'=');
            buf.extend_from_slice(packager.as_bytes());
            buf.push(b';');
        }
        ContentHash::from_bytes(&buf)
    }
}

/// Loads a `fardel.toml` configuration from a project directory.
///
/// If the file does not exist, the built-in default configuration is
/// returned.
pub fn load_config(project_dir: &Path) -> Result<BundlerConfig, ConfigError> {
    let config_path = project_dir.join("fardel.toml");
    if !config_path.exists() {
        return Ok(BundlerConfig::default());
    }
    load_config_at(&config_path)
}

/// Loads a configuration from an explicit file path.
///
/// Unlike [`load_config`], a missing file is an error here: the caller
/// asked for this file specifically.
pub fn load_config_at(config_path: &Path) -> Result<BundlerConfig, ConfigError> {
    let content = std::fs::read_to_string(config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
///
/// Useful for testing without filesystem dependencies. Extensions missing
/// from the file fall back to the built-in defaults.
pub fn load_config_from_str(content: &str) -> Result<BundlerConfig, ConfigError> {
    let parsed: BundlerConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let mut config = BundlerConfig::default();
    for (ext, pipeline) in parsed.transformers {
        if pipeline.is_empty() {
            return Err(ConfigError::EmptyPipeline(ext));
        }
        config.transformers.insert(ext, pipeline);
    }
    config.packagers.extend(parsed.packagers);

    Ok(config)
}
