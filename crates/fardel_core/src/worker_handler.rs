//! The job handler executed inside worker threads.
//!
//! Transform and package jobs cross into workers as serialized requests.
//! Each worker builds its own plugin registry and cache handle from the
//! broadcast init snapshot; cache read-through happens here, on the worker
//! side, so a cache hit skips the plugin work entirely.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use fardel_bundle::Bundle;
use fardel_cache::{CacheKey, ContentCache, KIND_PACKAGE, KIND_TRANSFORM};
use fardel_common::{ContentHash, Environment};
use fardel_config::BundlerConfig;
use fardel_graph::{Asset, AssetId, Dependency};
use fardel_workers::{decode, encode, JobFailure, JobHandler, WorkerInit};

use crate::plugin::{PluginRegistry, TransformInput};

/// The configuration snapshot broadcast to workers at pool startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// The bundler configuration plugins are resolved from.
    pub config: BundlerConfig,
    /// Root directory of the content cache.
    pub cache_dir: PathBuf,
    /// Whether jobs read from and write to the cache.
    pub use_cache: bool,
}

/// A job request, serialized across the worker boundary.
#[derive(Debug, Serialize, Deserialize)]
pub enum JobRequest {
    /// Transform one source file.
    Transform {
        /// Absolute path of the file.
        file_path: PathBuf,
        /// Environment the asset is built for.
        env: Environment,
    },
    /// Package one bundle from its assets, given in bundle order.
    Package {
        /// The bundle being packaged.
        bundle: Bundle,
        /// The bundle's assets.
        assets: Vec<Asset>,
    },
}

/// A job response, serialized back to the caller.
#[derive(Debug, Serialize, Deserialize)]
pub enum JobResponse {
    /// Result of a transform job.
    Transform {
        /// The transformed asset.
        asset: Asset,
        /// Dependencies discovered during transformation, in order.
        dependencies: Vec<Dependency>,
        /// `true` when the result came from the cache without plugin work.
        from_cache: bool,
    },
    /// Result of a package job.
    Package {
        /// Packaged output bytes.
        data: Vec<u8>,
        /// `true` when the bytes came from the cache.
        from_cache: bool,
    },
}

/// What a transform job persists in the cache.
#[derive(Serialize, Deserialize)]
struct TransformRecord {
    asset: Asset,
    dependencies: Vec<Dependency>,
}

struct HandlerState {
    registry: PluginRegistry,
    cache: Option<ContentCache>,
    config_hash: ContentHash,
}

/// Per-worker execution context for transform and package jobs.
///
/// Construction failures are deferred: a handler that failed to build
/// reports the failure on every job instead of taking the worker down.
pub struct BuildJobHandler {
    state: Result<HandlerState, String>,
}

impl BuildJobHandler {
    fn build_state(init: &WorkerInit) -> Result<HandlerState, String> {
        let config: WorkerConfig = init.decode().map_err(|e| e.to_string())?;
        let cache = if config.use_cache {
            Some(ContentCache::open(&config.cache_dir).map_err(|e| e.to_string())?)
        } else {
            None
        };
        let config_hash = config.config.hash();
        Ok(HandlerState {
            registry: PluginRegistry::with_builtins(config.config),
            cache,
            config_hash,
        })
    }
}

impl JobHandler for BuildJobHandler {
    fn from_init(init: &WorkerInit) -> Self {
        Self {
            state: Self::build_state(init),
        }
    }

    fn handle(&mut self, request: &[u8]) -> Result<Vec<u8>, JobFailure> {
        let state = match &self.state {
            Ok(state) => state,
            Err(message) => return Err(JobFailure::new("worker", message.clone())),
        };

        let request: JobRequest =
            decode(request).map_err(|e| JobFailure::new("worker", e.to_string()))?;
        let response = match request {
            JobRequest::Transform { file_path, env } => state.transform(&file_path, &env)?,
            JobRequest::Package { bundle, assets } => state.package(&bundle, &assets)?,
        };
        encode(&response).map_err(|e| JobFailure::new("worker", e.to_string()))
    }
}

impl HandlerState {
    fn transform(
        &self,
        file_path: &std::path::Path,
        env: &Environment,
    ) -> Result<JobResponse, JobFailure> {
        let code = std::fs::read_to_string(file_path).map_err(|e| {
            JobFailure::new("transform", format!("{}: {e}", file_path.display()))
        })?;
        let content_hash = ContentHash::from_bytes(code.as_bytes());
        let key = CacheKey::new(content_hash, self.config_hash, env.hash());

        if let Some(cache) = &self.cache {
            if let Some(bytes) = cache.get(KIND_TRANSFORM, &key) {
                // A corrupt record decodes as a miss, not an error.
                if let Ok(record) = decode::<TransformRecord>(&bytes) {
                    return Ok(JobResponse::Transform {
                        asset: record.asset,
                        dependencies: record.dependencies,
                        from_cache: true,
                    });
                }
            }
        }

        let extension = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        let pipeline = self
            .registry
            .pipeline(&extension)
            .map_err(|e| JobFailure::new("transform", e.message))?;

        let mut input = TransformInput {
            file_path: file_path.to_path_buf(),
            asset_type: extension,
            code,
            env: env.clone(),
        };
        let mut discovered = Vec::new();
        let mut meta = std::collections::BTreeMap::new();
        for stage in pipeline {
            let output = stage.transform(&input).map_err(|e| {
                JobFailure::new("transform", format!("{}: {}", stage.name(), e.message))
            })?;
            discovered.extend(output.dependencies);
            meta.extend(output.meta);
            input.asset_type = output.asset_type;
            input.code = output.code;
        }

        let dependencies: Vec<Dependency> = discovered
            .into_iter()
            .map(|d| {
                let mut dep = Dependency::new(d.specifier, file_path, env.clone());
                dep.is_async = d.is_async;
                dep.is_optional = d.is_optional;
                dep
            })
            .collect();

        let asset = Asset {
            id: AssetId::new(file_path, content_hash, self.config_hash, env.hash()),
            file_path: file_path.to_path_buf(),
            asset_type: input.asset_type,
            code: input.code,
            source_map: None,
            dependencies: dependencies.iter().map(|d| d.id).collect(),
            meta,
            env: env.clone(),
            is_source: true,
        };

        let record = TransformRecord {
            asset,
            dependencies,
        };
        if let Some(cache) = &self.cache {
            let bytes =
                encode(&record).map_err(|e| JobFailure::new("worker", e.to_string()))?;
            cache
                .set(KIND_TRANSFORM, &key, &bytes)
                .map_err(|e| JobFailure::new("worker", e.to_string()))?;
        }

        Ok(JobResponse::Transform {
            asset: record.asset,
            dependencies: record.dependencies,
            from_cache: false,
        })
    }

    fn package(&self, bundle: &Bundle, assets: &[Asset]) -> Result<JobResponse, JobFailure> {
        // Asset ids are content-derived, so the id list (plus the bundle
        // type and configuration) fully determines the output bytes.
        let mut parts: Vec<ContentHash> = assets.iter().map(|a| a.id.hash()).collect();
        parts.push(ContentHash::from_bytes(bundle.bundle_type.as_bytes()));
        parts.push(self.config_hash);
        let key = CacheKey::from_hash(ContentHash::combine(&parts));

        if let Some(cache) = &self.cache {
            if let Some(data) = cache.get(KIND_PACKAGE, &key) {
                return Ok(JobResponse::Package {
                    data,
                    from_cache: true,
                });
            }
        }

        let packager = self
            .registry
            .packager(&bundle.bundle_type)
            .map_err(|e| JobFailure::new("package", e.message))?;
        let data = packager
            .package(bundle, assets)
            .map_err(|e| JobFailure::new("package", format!("{}: {}", bundle.name, e.message)))?;

        if let Some(cache) = &self.cache {
            cache
                .set(KIND_PACKAGE, &key, &data)
                .map_err(|e| JobFailure::new("worker", e.to_string()))?;
        }

        Ok(JobResponse::Package {
            data,
            from_cache: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fardel_common::Target;

    fn handler(dir: &std::path::Path, use_cache: bool) -> BuildJobHandler {
        let config = WorkerConfig {
            config: BundlerConfig::default(),
            cache_dir: dir.join("cache"),
            use_cache,
        };
        BuildJobHandler::from_init(&WorkerInit::encode(&config).unwrap())
    }

    fn run(handler: &mut BuildJobHandler, request: &JobRequest) -> Result<JobResponse, JobFailure> {
        let bytes = encode(request).unwrap();
        handler.handle(&bytes).map(|out| decode(&out).unwrap())
    }

    fn transform(
        handler: &mut BuildJobHandler,
        path: &std::path::Path,
    ) -> Result<JobResponse, JobFailure> {
        run(
            handler,
            &JobRequest::Transform {
                file_path: path.to_path_buf(),
                env: Environment::browser(),
            },
        )
    }

    #[test]
    fn transform_discovers_dependencies() {
        let tmp = tempfile::tempdir().unwrap();
        let entry = tmp.path().join("index.js");
        std::fs::write(&entry, "import './a.js';\nconst x = 1;").unwrap();

        let mut handler = handler(tmp.path(), true);
        let response = transform(&mut handler, &entry).unwrap();
        let JobResponse::Transform {
            asset,
            dependencies,
            from_cache,
        } = response
        else {
            panic!("expected a transform response");
        };
        assert!(!from_cache);
        assert_eq!(asset.asset_type, "js");
        assert_eq!(dependencies.len(), 1);
        assert_eq!(dependencies[0].specifier, "./a.js");
        assert_eq!(asset.dependencies, vec![dependencies[0].id]);
    }

    #[test]
    fn second_transform_hits_the_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let entry = tmp.path().join("index.js");
        std::fs::write(&entry, "const x = 1;").unwrap();

        let mut handler = handler(tmp.path(), true);
        let first = transform(&mut handler, &entry).unwrap();
        let second = transform(&mut handler, &entry).unwrap();
        let (JobResponse::Transform { from_cache: a, .. }, JobResponse::Transform { from_cache: b, .. }) =
            (first, second)
        else {
            panic!("expected transform responses");
        };
        assert!(!a);
        assert!(b);
    }

    #[test]
    fn cache_can_be_disabled() {
        let tmp = tempfile::tempdir().unwrap();
        let entry = tmp.path().join("index.js");
        std::fs::write(&entry, "const x = 1;").unwrap();

        let mut handler = handler(tmp.path(), false);
        transform(&mut handler, &entry).unwrap();
        let JobResponse::Transform { from_cache, .. } = transform(&mut handler, &entry).unwrap()
        else {
            panic!("expected a transform response");
        };
        assert!(!from_cache);
    }

    #[test]
    fn missing_file_fails_as_transform() {
        let tmp = tempfile::tempdir().unwrap();
        let mut handler = handler(tmp.path(), true);
        let err = transform(&mut handler, &tmp.path().join("nope.js")).unwrap_err();
        assert_eq!(err.kind, "transform");
    }

    #[test]
    fn unknown_extension_fails_as_transform() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("module.wasm");
        std::fs::write(&file, "").unwrap();
        let mut handler = handler(tmp.path(), true);
        let err = transform(&mut handler, &file).unwrap_err();
        assert_eq!(err.kind, "transform");
        assert!(err.message.contains("wasm"));
    }

    #[test]
    fn package_roundtrip_and_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let entry = tmp.path().join("index.js");
        std::fs::write(&entry, "const x = 1;").unwrap();

        let mut handler = handler(tmp.path(), true);
        let JobResponse::Transform { asset, .. } = transform(&mut handler, &entry).unwrap() else {
            panic!("expected a transform response");
        };
        let bundle = Bundle::new(asset.id, "js", Target::new("default", "dist"), "index.js");
        let request = JobRequest::Package {
            bundle,
            assets: vec![asset],
        };

        let JobResponse::Package { data, from_cache } = run(&mut handler, &request).unwrap()
        else {
            panic!("expected a package response");
        };
        assert!(!from_cache);
        assert!(String::from_utf8(data).unwrap().contains("const x = 1;"));

        let JobResponse::Package { from_cache, .. } = run(&mut handler, &request).unwrap() else {
            panic!("expected a package response");
        };
        assert!(from_cache);
    }
}
