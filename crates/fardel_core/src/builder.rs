//! The asset graph builder: the incremental build pass.
//!
//! The builder owns the persistent asset graph and runs worklist passes
//! over it: pending dependencies are resolved, unresolved files are
//! transformed on the worker pool (with cache read-through on the worker
//! side), and transform results may enqueue new dependencies. A pass
//! terminates when nothing is pending and nothing is invalid.
//!
//! All graph merges are keyed by stable content-derived ids and the
//! worklist is drained in sorted order, so identical inputs produce an
//! identical graph regardless of job completion order.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fardel_common::Environment;
use fardel_diagnostics::{Diagnostic, DiagnosticSink};
use fardel_graph::{AssetGraph, AssetId};
use fardel_workers::{decode, encode, WorkerError, WorkerPool};

use crate::error::BuildError;
use crate::events::{FsEvent, FsEventKind};
use crate::resolver::Resolver;
use crate::worker_handler::{BuildJobHandler, JobRequest, JobResponse};

/// Cooperative cancellation flag, checked at worklist iteration
/// boundaries. Raised by the orchestrator when a newer build supersedes
/// the running one.
pub type AbortSignal = Arc<AtomicBool>;

/// What one build pass changed.
#[derive(Clone, Debug, Default)]
pub struct BuildOutput {
    /// Assets added or replaced during this pass, sorted by id.
    pub changed_assets: Vec<AssetId>,
    /// Assets dropped by file deletions or unreachability pruning since
    /// the previous successful pass, sorted by id.
    pub removed_assets: Vec<AssetId>,
    /// Transform jobs that actually ran plugins (cache hits excluded).
    pub transforms_executed: usize,
}

/// Builds and incrementally maintains the asset graph.
pub struct AssetGraphBuilder {
    graph: AssetGraph,
    resolver: Resolver,
    entries: Vec<PathBuf>,
    env: Environment,
    removed: Vec<AssetId>,
}

impl AssetGraphBuilder {
    /// Creates a builder for the given entries, rooted at the project
    /// directory, building for one environment.
    pub fn new(entries: Vec<PathBuf>, project_root: &Path, env: Environment) -> Self {
        Self {
            graph: AssetGraph::new(),
            resolver: Resolver::new(project_root),
            entries,
            env,
            removed: Vec::new(),
        }
    }

    /// Read-only view of the current graph.
    pub fn graph(&self) -> &AssetGraph {
        &self.graph
    }

    /// Returns `true` when pending invalidations require a build pass.
    pub fn is_invalid(&self) -> bool {
        self.graph.is_invalid()
    }

    /// Applies a batch of filesystem events to the graph.
    ///
    /// Updates invalidate the assets at that path. Deletions drop the
    /// assets and reopen the resolutions that pointed at them. Creations
    /// conservatively re-queue every previously failed (or dropped
    /// optional) resolution, since the new file might satisfy one.
    pub fn respond_to_fs_events(&mut self, events: &[FsEvent]) {
        for event in events {
            match event.kind {
                FsEventKind::Update => {
                    self.graph.invalidate_assets_at_path(&event.path);
                }
                FsEventKind::Delete => {
                    let dropped = self.graph.remove_assets_at_path(&event.path);
                    self.removed.extend(dropped);
                }
                FsEventKind::Create => {
                    self.graph.retry_failed_resolutions();
                    // Some editors surface a save as create-then-write.
                    self.graph.invalidate_assets_at_path(&event.path);
                }
            }
        }
    }

    /// Runs one build pass to fixpoint.
    ///
    /// On [`BuildError::Aborted`] the pass stops at the next iteration
    /// boundary; progress made so far is kept and the remaining
    /// invalidation state is preserved for the next pass. Any other error
    /// aborts the pass with the graph left consistent (the failing
    /// dependency is marked failed).
    pub fn build(
        &mut self,
        pool: &WorkerPool<BuildJobHandler>,
        signal: &AbortSignal,
        diagnostics: &DiagnosticSink,
    ) -> Result<BuildOutput, BuildError> {
        self.graph.set_entries(&self.entries, &self.env);

        let mut changed = Vec::new();
        let mut transforms = 0usize;

        loop {
            if signal.load(Ordering::SeqCst) {
                return Err(BuildError::Aborted);
            }

            // Re-transforms run before resolution: a re-transform can drop
            // dependencies the previous version declared, and those must
            // not reach the worklist.
            let invalid: Vec<PathBuf> = self
                .graph
                .invalid_assets()
                .into_iter()
                .map(|a| a.file_path)
                .collect();
            if !invalid.is_empty() {
                for path in invalid {
                    if signal.load(Ordering::SeqCst) {
                        return Err(BuildError::Aborted);
                    }
                    self.transform_file(&path, pool, &mut changed, &mut transforms)?;
                }
                continue;
            }

            let pending = self.graph.pending_dependencies();
            if pending.is_empty() {
                break;
            }

            for dep in pending {
                if signal.load(Ordering::SeqCst) {
                    return Err(BuildError::Aborted);
                }
                // A transform earlier in this batch may have replaced the
                // declaring asset and dropped the dependency with it.
                if self.graph.dependency(dep.id).is_none() {
                    continue;
                }
                match self.resolver.resolve(&dep) {
                    Ok(path) => {
                        let asset_id = match self.graph.valid_asset_at(&path, &dep.env) {
                            Some(id) => id,
                            None => {
                                self.transform_file(&path, pool, &mut changed, &mut transforms)?
                            }
                        };
                        self.graph.mark_resolved(dep.id, asset_id);
                    }
                    Err(err) if dep.is_optional => {
                        diagnostics.emit(
                            Diagnostic::warning(format!("optional dependency dropped: {err}"))
                                .with_origin("resolver"),
                        );
                        self.graph.mark_excluded(dep.id);
                    }
                    Err(err) => {
                        // Re-checked on the next create event.
                        self.graph.mark_failed(dep.id);
                        return Err(err);
                    }
                }
            }
        }

        let mut removed_assets = std::mem::take(&mut self.removed);
        removed_assets.extend(self.graph.prune_unreachable());
        removed_assets.sort();
        removed_assets.dedup();
        changed.sort();
        changed.dedup();
        Ok(BuildOutput {
            changed_assets: changed,
            removed_assets,
            transforms_executed: transforms,
        })
    }

    /// Runs a transform job for one file and merges the result.
    fn transform_file(
        &mut self,
        path: &Path,
        pool: &WorkerPool<BuildJobHandler>,
        changed: &mut Vec<AssetId>,
        transforms: &mut usize,
    ) -> Result<AssetId, BuildError> {
        let request = encode(&JobRequest::Transform {
            file_path: path.to_path_buf(),
            env: self.env.clone(),
        })?;
        let response = pool
            .invoke(&request)
            .map_err(|e| transform_error(path, e))?;
        let JobResponse::Transform {
            asset,
            dependencies,
            from_cache,
        } = decode::<JobResponse>(&response)?
        else {
            return Err(WorkerError::Serialization("mismatched job response".to_string()).into());
        };

        if !from_cache {
            *transforms += 1;
        }

        let asset_id = asset.id;
        if self.graph.upsert_asset(asset) {
            changed.push(asset_id);
        }
        if let Some(node) = self.graph.asset_node(asset_id) {
            for dep in dependencies {
                self.graph.add_dependency(node, dep);
            }
        }
        Ok(asset_id)
    }
}

/// Maps a worker failure from a transform job into the build taxonomy.
fn transform_error(path: &Path, err: WorkerError) -> BuildError {
    match err {
        WorkerError::Job { kind, message } if kind == "transform" => BuildError::Transform {
            path: path.to_path_buf(),
            message,
        },
        other => BuildError::Worker(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker_handler::WorkerConfig;
    use fardel_config::BundlerConfig;
    use fardel_workers::WorkerInit;

    struct Fixture {
        tmp: tempfile::TempDir,
        pool: WorkerPool<BuildJobHandler>,
        diagnostics: DiagnosticSink,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let config = WorkerConfig {
                config: BundlerConfig::default(),
                cache_dir: tmp.path().join(".fardel-cache"),
                use_cache: true,
            };
            let pool = WorkerPool::new(WorkerInit::encode(&config).unwrap(), 2);
            Self {
                tmp,
                pool,
                diagnostics: DiagnosticSink::new(),
            }
        }

        fn write(&self, name: &str, content: &str) -> PathBuf {
            let path = self.tmp.path().join(name);
            std::fs::write(&path, content).unwrap();
            path
        }

        fn builder(&self, entries: Vec<PathBuf>) -> AssetGraphBuilder {
            AssetGraphBuilder::new(entries, self.tmp.path(), Environment::browser())
        }

        fn build(&self, builder: &mut AssetGraphBuilder) -> Result<BuildOutput, BuildError> {
            let signal = AbortSignal::default();
            builder.build(&self.pool, &signal, &self.diagnostics)
        }
    }

    #[test]
    fn builds_a_two_file_graph() {
        let fx = Fixture::new();
        let entry = fx.write("index.js", "import './a.js';");
        fx.write("a.js", "const a = 1;");

        let mut builder = fx.builder(vec![entry]);
        let output = fx.build(&mut builder).unwrap();

        assert_eq!(builder.graph().asset_count(), 2);
        assert_eq!(output.changed_assets.len(), 2);
        assert_eq!(output.transforms_executed, 2);
        assert!(!builder.is_invalid());
    }

    #[test]
    fn second_build_runs_zero_transforms() {
        let fx = Fixture::new();
        let entry = fx.write("index.js", "import './a.js';");
        fx.write("a.js", "const a = 1;");

        let mut builder = fx.builder(vec![entry.clone()]);
        fx.build(&mut builder).unwrap();

        // A fresh builder in the same project replays entirely from cache.
        let mut cold = fx.builder(vec![entry]);
        let output = fx.build(&mut cold).unwrap();
        assert_eq!(output.transforms_executed, 0);
        assert_eq!(cold.graph().asset_count(), 2);
    }

    #[test]
    fn edit_invalidates_only_the_edited_chain() {
        let fx = Fixture::new();
        let entry = fx.write("index.js", "import './a.js';\nimport './b.js';");
        let a = fx.write("a.js", "const a = 1;");
        fx.write("b.js", "const b = 1;");

        let mut builder = fx.builder(vec![entry]);
        fx.build(&mut builder).unwrap();

        fx.write("a.js", "const a = 2;");
        builder.respond_to_fs_events(&[FsEvent::new(&a, FsEventKind::Update)]);
        assert!(builder.is_invalid());

        let output = fx.build(&mut builder).unwrap();
        // Only a.js re-transforms; index.js and b.js stay untouched.
        assert_eq!(output.transforms_executed, 1);
        assert_eq!(output.changed_assets.len(), 1);
        assert_eq!(builder.graph().asset_count(), 3);
    }

    #[test]
    fn deleted_import_lands_in_removed_assets() {
        let fx = Fixture::new();
        let entry = fx.write("index.js", "import './a.js';");
        let a = fx.write("a.js", "const a = 1;");

        let mut builder = fx.builder(vec![entry.clone()]);
        fx.build(&mut builder).unwrap();
        let a_id = builder
            .graph()
            .valid_asset_at(&a, &Environment::browser())
            .unwrap();

        // Drop the import and the file in the same batch.
        fx.write("index.js", "const x = 1;");
        std::fs::remove_file(&a).unwrap();
        builder.respond_to_fs_events(&[
            FsEvent::new(&entry, FsEventKind::Update),
            FsEvent::new(&a, FsEventKind::Delete),
        ]);

        let output = fx.build(&mut builder).unwrap();
        assert_eq!(output.removed_assets, vec![a_id]);
        assert_eq!(builder.graph().asset_count(), 1);
    }

    #[test]
    fn dependency_cycle_builds_to_completion() {
        let fx = Fixture::new();
        let entry = fx.write("a.js", "import './b.js';");
        fx.write("b.js", "import './a.js';");

        let mut builder = fx.builder(vec![entry]);
        let output = fx.build(&mut builder).unwrap();
        assert_eq!(builder.graph().asset_count(), 2);
        assert_eq!(output.transforms_executed, 2);
        assert!(!builder.is_invalid());
    }

    #[test]
    fn deterministic_asset_ids_across_cold_builds() {
        let fx = Fixture::new();
        let entry = fx.write("index.js", "import './a.js';\nimport './b.css';");
        fx.write("a.js", "const a = 1;");
        fx.write("b.css", "body {}");

        let mut first = fx.builder(vec![entry.clone()]);
        let out_a = fx.build(&mut first).unwrap();
        let mut second = fx.builder(vec![entry]);
        let out_b = fx.build(&mut second).unwrap();
        assert_eq!(out_a.changed_assets, out_b.changed_assets);
    }

    #[test]
    fn missing_import_is_fatal_and_retried_after_create() {
        let fx = Fixture::new();
        let entry = fx.write("index.js", "import './later.js';");

        let mut builder = fx.builder(vec![entry]);
        let err = fx.build(&mut builder).unwrap_err();
        assert!(matches!(err, BuildError::Resolution { .. }));

        // The file appears; the failed resolution is re-checked.
        let later = fx.write("later.js", "const l = 1;");
        builder.respond_to_fs_events(&[FsEvent::new(&later, FsEventKind::Create)]);
        assert!(builder.is_invalid());
        fx.build(&mut builder).unwrap();
        assert_eq!(builder.graph().asset_count(), 2);
    }

    #[test]
    fn optional_import_is_dropped_with_a_warning() {
        let fx = Fixture::new();
        // require() deps are sync and required; simulate an optional one
        // by marking the discovered dependency optional through the graph.
        let entry = fx.write("index.js", "const x = 1;");
        let mut builder = fx.builder(vec![entry.clone()]);
        fx.build(&mut builder).unwrap();

        use fardel_graph::Dependency;
        let mut dep = Dependency::new("./missing.js", &entry, Environment::browser());
        dep.is_optional = true;
        let entry_asset = builder.graph().valid_asset_at(&entry, &Environment::browser());
        let node = builder.graph.asset_node(entry_asset.unwrap()).unwrap();
        builder.graph.add_dependency(node, dep);

        let output = fx.build(&mut builder).unwrap();
        assert_eq!(output.transforms_executed, 0);
        assert!(!fx.diagnostics.has_errors());
        assert!(fx
            .diagnostics
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("optional dependency dropped")));
    }

    #[test]
    fn deleted_file_reopens_resolution() {
        let fx = Fixture::new();
        let entry = fx.write("index.js", "import './a.js';");
        let a = fx.write("a.js", "const a = 1;");

        let mut builder = fx.builder(vec![entry]);
        fx.build(&mut builder).unwrap();

        std::fs::remove_file(&a).unwrap();
        builder.respond_to_fs_events(&[FsEvent::new(&a, FsEventKind::Delete)]);
        let err = fx.build(&mut builder).unwrap_err();
        assert!(matches!(err, BuildError::Resolution { specifier, .. } if specifier == "./a.js"));
    }

    #[test]
    fn raised_signal_aborts_the_pass() {
        let fx = Fixture::new();
        let entry = fx.write("index.js", "const x = 1;");
        let mut builder = fx.builder(vec![entry]);

        let signal = AbortSignal::default();
        signal.store(true, Ordering::SeqCst);
        let err = builder
            .build(&fx.pool, &signal, &fx.diagnostics)
            .unwrap_err();
        assert!(err.is_abort());

        // The pending state survives for the next pass.
        assert!(builder.is_invalid());
        assert!(fx.build(&mut builder).is_ok());
    }
}
