//! The fardel build engine.
//!
//! Ties the asset graph builder, bundling policy, worker pool, and
//! watcher together behind the [`Fardel`] orchestrator: `init` resolves
//! options and constructs the pipeline, `build` runs one pass, `run` is
//! the one-shot entry point, and `watch` keeps rebuilding on filesystem
//! changes, broadcasting events to a reference-counted set of
//! subscribers.

#![warn(missing_docs)]

pub mod builder;
pub mod error;
pub mod events;
pub mod packagers;
pub mod plugin;
pub mod reporter;
pub mod resolver;
pub mod runner;
pub mod transformers;
pub mod watch;
pub mod worker_handler;

pub use builder::{AbortSignal, AssetGraphBuilder, BuildOutput};
pub use error::BuildError;
pub use events::{BuildEvent, FsEvent, FsEventKind};
pub use plugin::{
    BundlerPlugin, DiscoveredDependency, Packager, PluginError, PluginRegistry, TransformInput,
    TransformOutput, Transformer,
};
pub use reporter::{ConsoleReporter, Reporter};
pub use resolver::Resolver;
pub use runner::{BundlerRunner, DefaultBundler};
pub use watch::{ChannelWatcher, PollingWatcher, WatchGuard, Watcher};
pub use worker_handler::{BuildJobHandler, WorkerConfig};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use fardel_bundle::{BundleId, Stats};
use fardel_config::{load_config, load_config_at, resolve_options, InitialOptions, ResolvedOptions};
use fardel_diagnostics::DiagnosticSink;
use fardel_graph::Asset;
use fardel_workers::{decode, encode, WorkerError, WorkerInit, WorkerPool};

use worker_handler::{JobRequest, JobResponse};

/// The initialized build pipeline, shared between the caller and the
/// watch thread.
struct Pipeline {
    options: ResolvedOptions,
    builder: AssetGraphBuilder,
    runner: BundlerRunner,
    pool: WorkerPool<BuildJobHandler>,
}

/// The bundler orchestrator.
///
/// Moves through uninitialized → initialized → (building | idle). All
/// entry points initialize on demand, so callers can go straight to
/// [`build`](Self::build), [`run`](Self::run), or [`watch`](Self::watch).
pub struct Fardel {
    initial: InitialOptions,
    watcher: Arc<dyn Watcher>,
    pipeline: Option<Arc<Mutex<Pipeline>>>,
    abort: AbortSignal,
    diagnostics: Arc<DiagnosticSink>,
    watch_runtime: Mutex<Weak<WatchRuntime>>,
}

impl Fardel {
    /// Creates an orchestrator with the default polling watcher.
    pub fn new(initial: InitialOptions) -> Self {
        Self::with_watcher(initial, Arc::new(PollingWatcher::default()))
    }

    /// Creates an orchestrator with a custom watcher implementation.
    pub fn with_watcher(initial: InitialOptions, watcher: Arc<dyn Watcher>) -> Self {
        Self {
            initial,
            watcher,
            pipeline: None,
            abort: AbortSignal::default(),
            diagnostics: Arc::new(DiagnosticSink::new()),
            watch_runtime: Mutex::new(Weak::new()),
        }
    }

    /// Diagnostics accumulated by build passes (warnings included).
    pub fn diagnostics(&self) -> &DiagnosticSink {
        &self.diagnostics
    }

    /// Resolves options, loads configuration, and constructs the build
    /// pipeline and worker pool. Idempotent.
    pub fn init(&mut self) -> Result<(), BuildError> {
        if self.pipeline.is_some() {
            return Ok(());
        }

        let options = resolve_options(&self.initial)?;
        let config = match &options.config_path {
            Some(path) => load_config_at(path)?,
            None => load_config(&options.project_root)?,
        };

        let worker_config = WorkerConfig {
            config,
            cache_dir: options.cache_dir.clone(),
            use_cache: options.use_cache,
        };
        let pool = WorkerPool::new(WorkerInit::encode(&worker_config)?, options.workers);

        let env = options.targets[0].env.clone();
        let builder = AssetGraphBuilder::new(options.entries.clone(), &options.project_root, env);

        self.pipeline = Some(Arc::new(Mutex::new(Pipeline {
            options,
            builder,
            runner: BundlerRunner::with_default_policy(),
            pool,
        })));
        Ok(())
    }

    /// Runs one build pass: asset graph, bundling, parallel packaging,
    /// and output writing. Returns the success event.
    pub fn build(&mut self) -> Result<BuildEvent, BuildError> {
        self.init()?;
        let pipeline = self.pipeline()?;
        self.abort.store(false, Ordering::SeqCst);
        let mut pipeline = pipeline.lock().unwrap();
        run_pass(&mut pipeline, &self.abort, &self.diagnostics)
    }

    /// One-shot entry point: initialize, build once, and release the
    /// worker pool. Failures propagate to the caller.
    pub fn run(&mut self) -> Result<BuildEvent, BuildError> {
        let result = self.build();
        if let Some(pipeline) = &self.pipeline {
            pipeline.lock().unwrap().pool.shutdown();
        }
        result
    }

    /// Subscribes to the shared watch stream.
    ///
    /// The first subscriber starts the pipeline: an initial build runs
    /// and its events are delivered, then filesystem changes trigger
    /// rebuilds whose events every subscriber receives. Later subscribers
    /// share the same underlying watcher and see events from their
    /// subscription onward. The watcher stops when the last subscription
    /// drops.
    pub fn watch(&mut self) -> Result<BuildSubscription, BuildError> {
        self.init()?;

        let mut slot = self.watch_runtime.lock().unwrap();
        if let Some(runtime) = slot.upgrade() {
            return Ok(runtime.subscribe());
        }

        let pipeline = self.pipeline()?;
        let runtime = Arc::new(WatchRuntime::default());
        let subscription = runtime.subscribe();

        let (project_root, ignore) = {
            let pipeline = pipeline.lock().unwrap();
            let mut ignore = vec![
                pipeline.options.cache_dir.clone(),
                pipeline.options.project_root.join(".git"),
                pipeline.options.project_root.join(".hg"),
            ];
            ignore.extend(pipeline.options.targets.iter().map(|t| t.dist_dir.clone()));
            (pipeline.options.project_root.clone(), ignore)
        };

        let building = Arc::new(AtomicBool::new(false));
        let (fs_tx, fs_rx) = crossbeam_channel::unbounded::<Vec<FsEvent>>();
        let (event_tx, event_rx) = crossbeam_channel::unbounded::<Vec<FsEvent>>();

        let guard = self.watcher.watch(&project_root, &ignore, fs_tx);
        *runtime.guard.lock().unwrap() = Some(guard);

        // Relay: forwards watcher batches and raises the abort signal
        // when a batch supersedes a build in progress.
        let relay_abort = Arc::clone(&self.abort);
        let relay_building = Arc::clone(&building);
        let relay = std::thread::spawn(move || {
            while let Ok(batch) = fs_rx.recv() {
                if relay_building.load(Ordering::SeqCst) {
                    relay_abort.store(true, Ordering::SeqCst);
                }
                if event_tx.send(batch).is_err() {
                    break;
                }
            }
        });

        let weak_runtime = Arc::downgrade(&runtime);
        let abort = Arc::clone(&self.abort);
        let diagnostics = Arc::clone(&self.diagnostics);
        let worker = std::thread::spawn(move || {
            watch_loop(
                &pipeline,
                &event_rx,
                &weak_runtime,
                &abort,
                &building,
                &diagnostics,
            );
        });

        runtime.threads.lock().unwrap().extend([relay, worker]);
        *slot = Arc::downgrade(&runtime);
        Ok(subscription)
    }

    fn pipeline(&self) -> Result<Arc<Mutex<Pipeline>>, BuildError> {
        // init() ran in every public entry path.
        self.pipeline
            .clone()
            .ok_or_else(|| WorkerError::ShuttingDown.into())
    }
}

/// The rebuild loop driven by filesystem event batches.
fn watch_loop(
    pipeline: &Arc<Mutex<Pipeline>>,
    events: &Receiver<Vec<FsEvent>>,
    runtime: &Weak<WatchRuntime>,
    abort: &AbortSignal,
    building: &Arc<AtomicBool>,
    diagnostics: &DiagnosticSink,
) {
    let broadcast = |event: BuildEvent| {
        if let Some(runtime) = runtime.upgrade() {
            runtime.broadcast(event);
        }
    };

    let rebuild = |pipeline: &mut Pipeline| {
        abort.store(false, Ordering::SeqCst);
        building.store(true, Ordering::SeqCst);
        broadcast(BuildEvent::BuildStart);
        let result = run_pass(pipeline, abort, diagnostics);
        building.store(false, Ordering::SeqCst);
        match result {
            Ok(event) => broadcast(event),
            // A superseded pass emits nothing; the events that superseded
            // it are already queued and trigger the next pass.
            Err(err) if err.is_abort() => {}
            Err(err) => broadcast(BuildEvent::BuildFailure {
                message: err.to_string(),
            }),
        }
    };

    rebuild(&mut pipeline.lock().unwrap());

    while let Ok(batch) = events.recv() {
        let mut batches = vec![batch];
        while let Ok(more) = events.try_recv() {
            batches.push(more);
        }

        let mut pipeline = pipeline.lock().unwrap();
        for batch in &batches {
            pipeline.builder.respond_to_fs_events(batch);
        }
        if pipeline.builder.is_invalid() {
            rebuild(&mut pipeline);
        }
    }
}

/// Runs one complete build pass on an initialized pipeline.
fn run_pass(
    pipeline: &mut Pipeline,
    abort: &AbortSignal,
    diagnostics: &DiagnosticSink,
) -> Result<BuildEvent, BuildError> {
    let started = Instant::now();

    let output = pipeline.builder.build(&pipeline.pool, abort, diagnostics)?;
    let mut bundle_graph = pipeline
        .runner
        .run(pipeline.builder.graph(), &pipeline.options.targets)?;

    // Package every bundle in parallel on the pool, then write outputs.
    let jobs: Vec<(fardel_bundle::Bundle, Vec<Asset>)> = bundle_graph
        .bundles()
        .into_iter()
        .map(|bundle| {
            let assets: Vec<Asset> = bundle
                .asset_ids
                .iter()
                .filter_map(|id| pipeline.builder.graph().asset(*id).cloned())
                .collect();
            (bundle.clone(), assets)
        })
        .collect();

    let mut packaged: Vec<(BundleId, PathBuf, Vec<u8>, Stats)> = Vec::with_capacity(jobs.len());
    std::thread::scope(|scope| -> Result<(), BuildError> {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|(bundle, assets)| {
                let pool = pipeline.pool.clone();
                scope.spawn(move || package_bundle(&pool, bundle, assets))
            })
            .collect();
        for handle in handles {
            let result = handle.join().map_err(|_| WorkerError::Crashed)?;
            packaged.push(result?);
        }
        Ok(())
    })?;

    for (bundle_id, out_path, data, stats) in packaged {
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&out_path, &data)?;
        bundle_graph.set_stats(bundle_id, stats);
    }

    // Deletions count as changes too: a subscriber diffing against its
    // previous snapshot needs to hear about assets that went away.
    let mut changed_assets = output.changed_assets;
    changed_assets.extend(output.removed_assets);
    changed_assets.sort();
    changed_assets.dedup();

    Ok(BuildEvent::BuildSuccess {
        bundle_graph: Arc::new(bundle_graph),
        changed_assets,
        build_time: started.elapsed(),
    })
}

/// Packages one bundle on the pool, returning its output path, bytes,
/// and stats.
fn package_bundle(
    pool: &WorkerPool<BuildJobHandler>,
    bundle: fardel_bundle::Bundle,
    assets: Vec<Asset>,
) -> Result<(BundleId, PathBuf, Vec<u8>, Stats), BuildError> {
    let started = Instant::now();
    let bundle_id = bundle.id;
    let name = bundle.name.clone();
    let out_path = bundle.target.dist_dir.join(&bundle.name);

    let request = encode(&JobRequest::Package { bundle, assets })?;
    let response = pool.invoke(&request).map_err(|e| match e {
        WorkerError::Job { kind, message } if kind == "package" => BuildError::Package {
            bundle: name.clone(),
            message,
        },
        other => BuildError::Worker(other),
    })?;
    let JobResponse::Package { data, .. } = decode::<JobResponse>(&response)? else {
        return Err(WorkerError::Serialization("mismatched job response".to_string()).into());
    };

    let stats = Stats {
        size: data.len() as u64,
        time_ms: started.elapsed().as_millis() as u64,
    };
    Ok((bundle_id, out_path, data, stats))
}

/// Shared state behind one active watch pipeline.
///
/// Subscriptions hold strong references; when the last one drops, `Drop`
/// tears the watcher and worker threads down in dependency order.
#[derive(Default)]
struct WatchRuntime {
    subscribers: Mutex<Vec<(u64, Sender<BuildEvent>)>>,
    next_id: AtomicU64,
    guard: Mutex<Option<WatchGuard>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl WatchRuntime {
    fn subscribe(self: &Arc<Self>) -> BuildSubscription {
        let (tx, rx) = crossbeam_channel::unbounded();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().unwrap().push((id, tx));
        BuildSubscription {
            id,
            receiver: rx,
            runtime: Arc::clone(self),
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|(sub_id, _)| *sub_id != id);
    }

    fn broadcast(&self, event: BuildEvent) {
        for (_, sender) in self.subscribers.lock().unwrap().iter() {
            let _ = sender.send(event.clone());
        }
    }
}

impl Drop for WatchRuntime {
    fn drop(&mut self) {
        // Stopping the watcher closes the fs channel; the relay then
        // closes the event channel and the rebuild loop exits.
        if let Ok(guard) = self.guard.get_mut() {
            drop(guard.take());
        }
        if let Ok(threads) = self.threads.get_mut() {
            for handle in threads.drain(..) {
                // The rebuild loop briefly holds a strong reference while
                // broadcasting; if the final drop lands there, it must not
                // join itself.
                if handle.thread().id() == std::thread::current().id() {
                    continue;
                }
                let _ = handle.join();
            }
        }
    }
}

/// A handle on the shared watch event stream.
pub struct BuildSubscription {
    id: u64,
    receiver: Receiver<BuildEvent>,
    runtime: Arc<WatchRuntime>,
}

impl BuildSubscription {
    /// Blocks until the next build event, or `None` when the stream ends.
    pub fn recv(&self) -> Option<BuildEvent> {
        self.receiver.recv().ok()
    }

    /// Waits up to `timeout` for the next build event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<BuildEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Returns a pending event without blocking.
    pub fn try_recv(&self) -> Option<BuildEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for BuildSubscription {
    fn drop(&mut self) {
        self.runtime.unsubscribe(self.id);
    }
}
