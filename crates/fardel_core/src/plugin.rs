//! Plugin traits and the per-build plugin registry.
//!
//! Plugins are looked up by name from the bundler configuration exactly
//! once per build, producing a registry of resolved capabilities. Job
//! dispatch then works against the registry; there is no name lookup or
//! fallback chain at transform time.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use fardel_bundle::{Bundle, BundleGraph};
use fardel_common::{Environment, Target};
use fardel_config::BundlerConfig;
use fardel_graph::{Asset, AssetGraph};

use crate::error::BuildError;

/// A failure inside a transformer or packager.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct PluginError {
    /// Failure description.
    pub message: String,
}

impl PluginError {
    /// Creates a plugin failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The input handed to a transformer pipeline.
#[derive(Clone, Debug)]
pub struct TransformInput {
    /// The file being transformed.
    pub file_path: PathBuf,
    /// Current type tag, starting as the file extension.
    pub asset_type: String,
    /// Current content, starting as the file's bytes decoded as UTF-8.
    pub code: String,
    /// The environment the asset is being built for.
    pub env: Environment,
}

/// A dependency discovered by a transformer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredDependency {
    /// The raw module specifier.
    pub specifier: String,
    /// Dynamic import: loaded asynchronously, starts a new bundle group.
    pub is_async: bool,
    /// Resolution failure is a warning, not an error.
    pub is_optional: bool,
}

impl DiscoveredDependency {
    /// A synchronous, required dependency.
    pub fn sync(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            is_async: false,
            is_optional: false,
        }
    }

    /// An asynchronous dependency (dynamic import).
    pub fn lazy(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            is_async: true,
            is_optional: false,
        }
    }
}

/// Output of one transformer stage.
#[derive(Clone, Debug)]
pub struct TransformOutput {
    /// Post-transform type tag.
    pub asset_type: String,
    /// Post-transform content.
    pub code: String,
    /// Dependencies discovered in this stage, in order of appearance.
    pub dependencies: Vec<DiscoveredDependency>,
    /// Opaque metadata for downstream stages and packagers.
    pub meta: BTreeMap<String, String>,
}

/// A content transformer stage.
///
/// Stages in a pipeline run in configuration order, each consuming the
/// previous stage's output. Transformers must be pure functions of their
/// input so results can be cached by content key.
pub trait Transformer: Send + Sync {
    /// The configuration name this transformer registers under.
    fn name(&self) -> &'static str;

    /// Transforms one input, reporting discovered dependencies.
    fn transform(&self, input: &TransformInput) -> Result<TransformOutput, PluginError>;
}

/// Serializes a bundle's assets into output bytes.
pub trait Packager: Send + Sync {
    /// The configuration name this packager registers under.
    fn name(&self) -> &'static str;

    /// Packages the bundle's assets, given in bundle order.
    fn package(&self, bundle: &Bundle, assets: &[Asset]) -> Result<Vec<u8>, PluginError>;
}

/// A bundling policy: turns an asset graph into a bundle graph.
pub trait BundlerPlugin: Send + Sync {
    /// The policy's name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Produces the bundle graph for the given targets.
    fn bundle(&self, graph: &AssetGraph, targets: &[Target]) -> Result<BundleGraph, BuildError>;
}

/// Plugins resolved from configuration, once per build.
///
/// Lookup failures surface here, at registry construction or first use,
/// rather than deep inside a worker job.
pub struct PluginRegistry {
    transformers: BTreeMap<&'static str, Arc<dyn Transformer>>,
    packagers: BTreeMap<&'static str, Arc<dyn Packager>>,
    config: BundlerConfig,
}

impl PluginRegistry {
    /// Builds a registry over the built-in plugins for a configuration.
    pub fn with_builtins(config: BundlerConfig) -> Self {
        let mut registry = Self {
            transformers: BTreeMap::new(),
            packagers: BTreeMap::new(),
            config,
        };
        registry.register_transformer(Arc::new(crate::transformers::JsTransformer));
        registry.register_transformer(Arc::new(crate::transformers::JsonTransformer));
        registry.register_transformer(Arc::new(crate::transformers::CssTransformer));
        registry.register_packager(Arc::new(crate::packagers::JsPackager));
        registry.register_packager(Arc::new(crate::packagers::CssPackager));
        registry
    }

    /// Registers a transformer under its name.
    pub fn register_transformer(&mut self, transformer: Arc<dyn Transformer>) {
        self.transformers.insert(transformer.name(), transformer);
    }

    /// Registers a packager under its name.
    pub fn register_packager(&mut self, packager: Arc<dyn Packager>) {
        self.packagers.insert(packager.name(), packager);
    }

    /// Resolves the transformer pipeline for a file extension.
    ///
    /// Returns an error when the extension has no configured pipeline or
    /// a configured name matches no registered plugin.
    pub fn pipeline(&self, extension: &str) -> Result<Vec<Arc<dyn Transformer>>, PluginError> {
        let names = self.config.pipeline_for(extension).ok_or_else(|| {
            PluginError::new(format!("no transformer pipeline for '.{extension}' files"))
        })?;
        names
            .iter()
            .map(|name| {
                self.transformers
                    .get(name.as_str())
                    .cloned()
                    .ok_or_else(|| PluginError::new(format!("unknown transformer '{name}'")))
            })
            .collect()
    }

    /// Resolves the packager for an output type tag.
    pub fn packager(&self, asset_type: &str) -> Result<Arc<dyn Packager>, PluginError> {
        let name = self
            .config
            .packager_for(asset_type)
            .ok_or_else(|| PluginError::new(format!("no packager for '{asset_type}' bundles")))?;
        self.packagers
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::new(format!("unknown packager '{name}'")))
    }

    /// The configuration the registry was resolved from.
    pub fn config(&self) -> &BundlerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PluginRegistry {
        PluginRegistry::with_builtins(BundlerConfig::default())
    }

    #[test]
    fn builtin_pipelines_resolve() {
        let registry = registry();
        let js = registry.pipeline("js").unwrap();
        assert_eq!(js.len(), 1);
        assert_eq!(js[0].name(), "transformer-js");
        assert!(registry.pipeline("css").is_ok());
        assert!(registry.pipeline("json").is_ok());
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let Err(err) = registry().pipeline("wasm") else {
            panic!("expected a plugin error");
        };
        assert!(err.message.contains(".wasm"));
    }

    #[test]
    fn unknown_plugin_name_is_an_error() {
        let mut config = BundlerConfig::default();
        config
            .transformers
            .insert("js".to_string(), vec!["transformer-nope".to_string()]);
        let registry = PluginRegistry::with_builtins(config);
        let Err(err) = registry.pipeline("js") else {
            panic!("expected a plugin error");
        };
        assert!(err.message.contains("transformer-nope"));
    }

    #[test]
    fn builtin_packagers_resolve() {
        let registry = registry();
        assert_eq!(registry.packager("js").unwrap().name(), "packager-js");
        assert_eq!(registry.packager("css").unwrap().name(), "packager-css");
        assert!(registry.packager("wasm").is_err());
    }
}
