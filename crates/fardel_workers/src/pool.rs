//! The worker pool.
//!
//! A fixed set of worker threads executes CPU-bound jobs behind a
//! serialized-bytes boundary. Each worker owns a private handler context
//! built once at spawn from a shared init snapshot; there is no live
//! mutation channel back into a running worker. A crashing job is isolated
//! with `catch_unwind`, the worker's context is rebuilt, and the job is
//! retried once before the failure surfaces to the caller.

use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::WorkerError;
use crate::job::{self, JobFailure};

/// The shared configuration snapshot broadcast to every worker at startup.
///
/// Holds serialized bytes only, so the same snapshot could cross a process
/// boundary unchanged. Workers decode it once while building their handler
/// context and treat it as read-only thereafter.
#[derive(Clone, Debug)]
pub struct WorkerInit {
    bytes: Vec<u8>,
}

impl WorkerInit {
    /// Serializes a configuration value into an init snapshot.
    pub fn encode<T: Serialize>(config: &T) -> Result<Self, WorkerError> {
        Ok(Self {
            bytes: job::encode(config)?,
        })
    }

    /// Decodes the snapshot back into a configuration value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, WorkerError> {
        job::decode(&self.bytes)
    }
}

/// A per-worker job execution context.
///
/// One handler is constructed per worker thread from the shared
/// [`WorkerInit`] snapshot. The handler owns whatever state job execution
/// needs (plugin registry, cache handle); nothing is shared between workers.
pub trait JobHandler: Sized + Send + 'static {
    /// Builds the handler from the broadcast init snapshot.
    fn from_init(init: &WorkerInit) -> Self;

    /// Executes one job. Request and response are serialized bytes.
    fn handle(&mut self, request: &[u8]) -> Result<Vec<u8>, JobFailure>;
}

/// Outcome of one job execution attempt inside a worker.
enum Outcome {
    /// The handler ran to completion (successfully or with a structured failure).
    Done(Result<Vec<u8>, JobFailure>),
    /// The handler panicked; its context was discarded and rebuilt.
    Crashed,
}

struct Job {
    request: Vec<u8>,
    reply: Sender<Outcome>,
}

struct PoolInner {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl PoolInner {
    /// Stops accepting jobs, lets workers drain the queue, and joins them.
    fn shutdown(&self) {
        // Dropping the sender disconnects the channel; workers finish any
        // queued jobs and then exit their receive loop.
        drop(self.sender.lock().unwrap().take());
        let mut workers = self.workers.lock().unwrap();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A reference-counted handle to a pool of worker threads.
///
/// Cloning the handle shares the same underlying workers, so concurrent
/// builds can hold the pool while an earlier build's cleanup is still
/// finishing. The workers shut down when the last handle drops, or earlier
/// via [`shutdown`](Self::shutdown).
pub struct WorkerPool<H: JobHandler> {
    inner: Arc<PoolInner>,
    _handler: PhantomData<fn() -> H>,
}

impl<H: JobHandler> Clone for WorkerPool<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _handler: PhantomData,
        }
    }
}

impl<H: JobHandler> WorkerPool<H> {
    /// Spawns a pool of `workers` threads (at least one), each building its
    /// handler context from the given init snapshot.
    pub fn new(init: WorkerInit, workers: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let init = Arc::new(init);

        let handles = (0..workers)
            .map(|_| {
                let receiver = receiver.clone();
                let init = Arc::clone(&init);
                std::thread::spawn(move || worker_loop::<H>(&init, &receiver))
            })
            .collect();

        Self {
            inner: Arc::new(PoolInner {
                sender: Mutex::new(Some(sender)),
                workers: Mutex::new(handles),
                worker_count: workers,
            }),
            _handler: PhantomData,
        }
    }

    /// Returns the number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.inner.worker_count
    }

    /// Executes a job on any idle worker and blocks until its result arrives.
    ///
    /// A job that crashes its worker is retried once on a fresh context; a
    /// second crash surfaces as [`WorkerError::Crashed`]. Other in-flight
    /// jobs are unaffected either way.
    pub fn invoke(&self, request: &[u8]) -> Result<Vec<u8>, WorkerError> {
        for _ in 0..2 {
            let sender = match &*self.inner.sender.lock().unwrap() {
                Some(sender) => sender.clone(),
                None => return Err(WorkerError::ShuttingDown),
            };

            let (reply_tx, reply_rx) = bounded(1);
            sender
                .send(Job {
                    request: request.to_vec(),
                    reply: reply_tx,
                })
                .map_err(|_| WorkerError::ShuttingDown)?;

            match reply_rx.recv() {
                Ok(Outcome::Done(Ok(response))) => return Ok(response),
                Ok(Outcome::Done(Err(failure))) => return Err(failure.into()),
                Ok(Outcome::Crashed) => continue,
                // The worker thread died without replying.
                Err(_) => return Err(WorkerError::Crashed),
            }
        }
        Err(WorkerError::Crashed)
    }

    /// Drains in-flight jobs and terminates all workers.
    ///
    /// Jobs submitted after shutdown begins fail with
    /// [`WorkerError::ShuttingDown`]. Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

fn worker_loop<H: JobHandler>(init: &WorkerInit, jobs: &Receiver<Job>) {
    let mut handler = H::from_init(init);
    while let Ok(job) = jobs.recv() {
        match catch_unwind(AssertUnwindSafe(|| handler.handle(&job.request))) {
            Ok(result) => {
                let _ = job.reply.send(Outcome::Done(result));
            }
            Err(_) => {
                let _ = job.reply.send(Outcome::Crashed);
                // The panic may have left the context in a bad state.
                handler = H::from_init(init);
            }
        }
    }
}
