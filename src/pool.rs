//! Chunked worker pool with per-worker state.
//!
//! A feeder thread groups source items into chunks and pushes them through a
//! bounded channel; `workers` threads pull chunks, run `work` on every item
//! and send results back on a second bounded channel.
//!
//! ```text
//! source ─► feeder ─► [chunk queue] ─► worker 0 (state 0) ─┐
//!                                  ├─► worker 1 (state 1) ─┼─► [output queue] ─► PoolStream
//!                                  └─► worker N (state N) ─┘
//! ```
//!
//! Each worker builds its own state with `init(worker_id)` before touching
//! any item. State never crosses threads, so it does not need to be `Send`;
//! this is where resource handles such as store readers live.
//!
//! Results arrive in completion order. Nothing downstream of a pool may rely
//! on the order of its input.

use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the pool itself. Failures of individual items are part
/// of the caller's output type.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// A worker could not build its state. Fatal to the whole pass.
    #[error("worker {worker} failed to initialize: {reason}")]
    WorkerInit { worker: usize, reason: String },

    #[error("failed to spawn pool thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// `work` panicked on one item. The item produced no output; the worker
    /// rebuilt its state and carried on with the rest of its chunk.
    #[error("worker {worker} panicked while processing an item: {message}")]
    WorkerPanicked { worker: usize, message: String },
}

/// Sizing of a [`WorkerPool`] run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Items per chunk handed to a worker.
    pub chunk_size: usize,
    /// Capacity of the chunk queue and the output queue, in chunks.
    pub queue_depth: usize,
    /// Drop and rebuild worker state after this many chunks. `None` keeps the
    /// state for the whole run.
    pub recycle_after: Option<usize>,
}

impl PoolConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    pub fn with_recycle_after(mut self, recycle_after: Option<usize>) -> Self {
        self.recycle_after = recycle_after;
        self
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.workers == 0 {
            return Err(PoolError::InvalidConfig("workers must be > 0".into()));
        }
        if self.chunk_size == 0 {
            return Err(PoolError::InvalidConfig("chunk_size must be > 0".into()));
        }
        if self.queue_depth == 0 {
            return Err(PoolError::InvalidConfig(
                "queue_depth must be > 0 to prevent deadlocks".into(),
            ));
        }
        if self.recycle_after == Some(0) {
            return Err(PoolError::InvalidConfig("recycle_after must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            chunk_size: 1000,
            queue_depth: 4,
            recycle_after: None,
        }
    }
}

/// Available parallelism, or 1 when it cannot be determined.
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Entry point for pool runs.
pub struct WorkerPool;

impl WorkerPool {
    /// Start a pool over `source` and return the stream of its results.
    ///
    /// `init` runs once per worker at start-up and again after every
    /// recycle; `work` runs once per item with the worker's state.
    pub fn run<I, T, S, E, O, Init, Work>(
        source: I,
        config: &PoolConfig,
        init: Init,
        work: Work,
    ) -> Result<PoolStream<O>, PoolError>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
        T: Send + 'static,
        O: Send + 'static,
        E: Display,
        Init: Fn(usize) -> Result<S, E> + Send + Sync + 'static,
        Work: Fn(&mut S, T) -> O + Send + Sync + 'static,
    {
        config.validate()?;

        let (chunk_tx, chunk_rx) = bounded::<Vec<T>>(config.queue_depth);
        let (output_tx, output_rx) = bounded::<Result<O, PoolError>>(config.queue_depth * config.chunk_size);
        let shutdown = Arc::new(AtomicBool::new(false));
        let init = Arc::new(init);
        let work = Arc::new(work);

        let mut stream = PoolStream {
            output_rx: Some(output_rx),
            shutdown: Arc::clone(&shutdown),
            workers: Vec::with_capacity(config.workers),
            feeder: None,
        };

        for worker_id in 0..config.workers {
            let chunk_rx = chunk_rx.clone();
            let output_tx = output_tx.clone();
            let shutdown = Arc::clone(&shutdown);
            let init = Arc::clone(&init);
            let work = Arc::clone(&work);
            let recycle_after = config.recycle_after;

            let handle = thread::Builder::new()
                .name(format!("newsprep-worker-{worker_id}"))
                .spawn(move || {
                    worker_loop(
                        worker_id,
                        chunk_rx,
                        output_tx,
                        shutdown,
                        recycle_after,
                        init.as_ref(),
                        work.as_ref(),
                    )
                })
                .map_err(PoolError::Spawn)?;
            stream.workers.push(handle);
        }
        drop(chunk_rx);
        drop(output_tx);

        let chunk_size = config.chunk_size;
        let feeder_shutdown = Arc::clone(&shutdown);
        let items = source.into_iter();
        let feeder = thread::Builder::new()
            .name("newsprep-feeder".into())
            .spawn(move || feed(items, chunk_size, chunk_tx, feeder_shutdown))
            .map_err(PoolError::Spawn)?;
        stream.feeder = Some(feeder);

        tracing::debug!(
            workers = config.workers,
            chunk_size = config.chunk_size,
            recycle_after = ?config.recycle_after,
            "worker pool started"
        );
        Ok(stream)
    }
}

fn feed<It, T>(items: It, chunk_size: usize, chunk_tx: Sender<Vec<T>>, shutdown: Arc<AtomicBool>)
where
    It: Iterator<Item = T>,
{
    let mut chunk = Vec::with_capacity(chunk_size);
    for item in items {
        chunk.push(item);
        if chunk.len() == chunk_size {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            let full = std::mem::replace(&mut chunk, Vec::with_capacity(chunk_size));
            if chunk_tx.send(full).is_err() {
                return;
            }
        }
    }
    if !chunk.is_empty() && !shutdown.load(Ordering::Relaxed) {
        let _ = chunk_tx.send(chunk);
    }
}

fn worker_loop<T, S, E, O>(
    worker_id: usize,
    chunk_rx: Receiver<Vec<T>>,
    output_tx: Sender<Result<O, PoolError>>,
    shutdown: Arc<AtomicBool>,
    recycle_after: Option<usize>,
    init: &(dyn Fn(usize) -> Result<S, E> + Send + Sync),
    work: &(dyn Fn(&mut S, T) -> O + Send + Sync),
) where
    E: Display,
{
    let build = |worker: usize| {
        init(worker).map_err(|err| PoolError::WorkerInit {
            worker,
            reason: err.to_string(),
        })
    };

    let mut state = match build(worker_id) {
        Ok(state) => Some(state),
        Err(err) => {
            tracing::error!(worker = worker_id, error = %err, "pool worker failed to initialize");
            let _ = output_tx.send(Err(err));
            return;
        }
    };
    let mut chunks_done = 0usize;

    for chunk in chunk_rx.iter() {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }

        for item in chunk {
            if state.is_none() {
                match build(worker_id) {
                    Ok(fresh) => state = Some(fresh),
                    Err(err) => {
                        tracing::error!(worker = worker_id, error = %err, "pool worker failed to re-initialize");
                        let _ = output_tx.send(Err(err));
                        return;
                    }
                }
            }
            let Some(current) = state.as_mut() else {
                return;
            };

            let result = match panic::catch_unwind(AssertUnwindSafe(|| work(current, item))) {
                Ok(output) => Ok(output),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(worker = worker_id, panic = %message, "pool worker panicked on an item");
                    // State may be half-updated after an unwind.
                    state = None;
                    Err(PoolError::WorkerPanicked {
                        worker: worker_id,
                        message,
                    })
                }
            };
            if output_tx.send(result).is_err() {
                return;
            }
        }

        chunks_done += 1;
        if recycle_after.is_some_and(|limit| chunks_done >= limit) {
            tracing::trace!(worker = worker_id, chunks = chunks_done, "recycling worker state");
            state = None;
            chunks_done = 0;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Results of a pool run, in completion order.
///
/// Dropping the stream stops the pool: pending results are discarded and
/// every thread is joined.
pub struct PoolStream<O> {
    output_rx: Option<Receiver<Result<O, PoolError>>>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<thread::JoinHandle<()>>,
    feeder: Option<thread::JoinHandle<()>>,
}

impl<O> Iterator for PoolStream<O> {
    type Item = Result<O, PoolError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.output_rx.as_ref()?.recv().ok()
    }
}

impl<O> Drop for PoolStream<O> {
    fn drop(&mut self) {
        // Closing the output side first unblocks workers parked on `send`.
        self.output_rx.take();
        self.shutdown.store(true, Ordering::Relaxed);

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("pool worker panicked");
            }
        }
        if let Some(feeder) = self.feeder.take() {
            if feeder.join().is_err() {
                tracing::error!("pool feeder panicked");
            }
        }
    }
}
