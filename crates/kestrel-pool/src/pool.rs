use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use kestrel_core::{KestrelError, Result};

use crate::task::{Task, TaskResult};

/// A task paired with an optional dedicated reply channel.
///
/// `submit_wait` routes its result through the reply channel only, so a
/// result intended for one caller can never be observed by another.
struct Envelope {
    task: Box<dyn Task>,
    reply: Option<oneshot::Sender<TaskResult>>,
}

struct PoolState {
    task_tx: Option<mpsc::Sender<Envelope>>,
    result_rx: Option<mpsc::Receiver<TaskResult>>,
    handles: Vec<JoinHandle<()>>,
}

/// Point-in-time pool statistics.
///
/// `processed` and `errors` are maintained with lock-free atomic counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    /// Configured worker count.
    pub workers: usize,
    /// Tasks executed to completion (success or failure).
    pub processed: u64,
    /// Tasks whose `execute` returned an error.
    pub errors: u64,
    /// Tasks currently waiting in the bounded queue.
    pub queued: usize,
}

/// Fixed-size pool of workers draining a bounded task queue.
///
/// The queue bound provides backpressure: [`WorkerPool::submit`] blocks when
/// the queue is full rather than buffering without limit. Results are
/// delivered in completion order, not submission order.
///
/// # Examples
///
/// ```
/// use kestrel_pool::{FnTask, WorkerPool};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = WorkerPool::new(2, 8);
/// pool.start();
///
/// let result = pool
///     .submit_wait(Box::new(FnTask::new("greet", |_| async { Ok(()) })))
///     .await
///     .unwrap();
/// assert_eq!(result.task_id, "greet");
/// assert!(result.is_ok());
///
/// pool.stop().await;
/// # }
/// ```
pub struct WorkerPool {
    workers: usize,
    queue_size: usize,
    cancel: CancellationToken,
    started: AtomicBool,
    processed: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
    state: Mutex<PoolState>,
}

impl WorkerPool {
    /// Create a pool with `workers` workers and a queue bounded at
    /// `queue_size`. No workers run until [`WorkerPool::start`].
    pub fn new(workers: usize, queue_size: usize) -> Self {
        Self {
            workers: workers.max(1),
            queue_size: queue_size.max(1),
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            processed: Arc::new(AtomicU64::new(0)),
            errors: Arc::new(AtomicU64::new(0)),
            state: Mutex::new(PoolState {
                task_tx: None,
                result_rx: None,
                handles: Vec::new(),
            }),
        }
    }

    /// Spawn the workers. Idempotent: a second call is a no-op and never
    /// spawns duplicates. A stopped pool cannot be restarted.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let (task_tx, task_rx) = mpsc::channel::<Envelope>(self.queue_size);
        let (result_tx, result_rx) = mpsc::channel::<TaskResult>(self.queue_size);
        let shared_rx = Arc::new(tokio::sync::Mutex::new(task_rx));

        let mut handles = Vec::with_capacity(self.workers);
        for idx in 0..self.workers {
            handles.push(tokio::spawn(worker_loop(
                idx,
                shared_rx.clone(),
                result_tx.clone(),
                self.cancel.clone(),
                self.processed.clone(),
                self.errors.clone(),
            )));
        }
        drop(result_tx);

        let mut state = self.lock_state();
        state.task_tx = Some(task_tx);
        state.result_rx = Some(result_rx);
        state.handles = handles;
        tracing::debug!(workers = self.workers, queue = self.queue_size, "pool started");
    }

    /// Enqueue a task, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::Pool`] if the pool was never started, has been
    /// stopped, or is cancelled while this call is blocked on a full queue.
    pub async fn submit(&self, task: Box<dyn Task>) -> Result<()> {
        self.send(Envelope { task, reply: None }).await
    }

    /// Submit a task and wait for its own result.
    ///
    /// Every call gets a dedicated reply channel; the result bypasses the
    /// shared stream from [`WorkerPool::take_results`], so concurrent callers
    /// can never consume each other's results. Callers wanting a deadline
    /// should wrap this in [`tokio::time::timeout`].
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::Pool`] under the same conditions as
    /// [`WorkerPool::submit`], or if the pool shuts down before the task's
    /// result is produced.
    pub async fn submit_wait(&self, task: Box<dyn Task>) -> Result<TaskResult> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Envelope {
            task,
            reply: Some(reply_tx),
        })
        .await?;

        tokio::select! {
            _ = self.cancel.cancelled() => {
                Err(KestrelError::Pool("pool shut down before result".into()))
            }
            result = reply_rx => {
                result.map_err(|_| KestrelError::Pool("pool dropped task before execution".into()))
            }
        }
    }

    /// Take the shared result stream. Yields `None` once per pool; results
    /// arrive in completion order and the stream closes when all workers
    /// have exited.
    pub fn take_results(&self) -> Option<mpsc::Receiver<TaskResult>> {
        self.lock_state().result_rx.take()
    }

    /// Hard shutdown: signal cancellation, close the input queue, and wait
    /// for all workers to exit. In-flight tasks observe the cancellation
    /// token but are not forcibly interrupted; queued tasks may be dropped.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let (task_tx, handles) = self.teardown();
        drop(task_tx);
        for handle in handles {
            let _ = handle.await;
        }
        tracing::debug!("pool stopped");
    }

    /// Soft shutdown: close the input queue first so already-queued tasks
    /// drain under normal execution, then cancel and wait for the workers.
    ///
    /// The caller must keep draining the shared result stream while the
    /// queue drains: cancellation fires only after the workers have exited,
    /// so an undrained stream deadlocks this call once pending results
    /// exceed the result channel's capacity (the queue size). Fewer pending
    /// results than that fit in the channel and need no drain.
    pub async fn stop_wait(&self) {
        let (task_tx, handles) = self.teardown();
        drop(task_tx);
        for handle in handles {
            let _ = handle.await;
        }
        self.cancel.cancel();
        tracing::debug!("pool drained and stopped");
    }

    /// Current statistics.
    pub fn stats(&self) -> PoolStats {
        let queued = self
            .lock_state()
            .task_tx
            .as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0);
        PoolStats {
            workers: self.workers,
            processed: self.processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            queued,
        }
    }

    async fn send(&self, envelope: Envelope) -> Result<()> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(KestrelError::Pool("pool is not started".into()));
        }
        let Some(tx) = self.lock_state().task_tx.clone() else {
            return Err(KestrelError::Pool("pool is stopped".into()));
        };

        tokio::select! {
            _ = self.cancel.cancelled() => {
                Err(KestrelError::Pool("pool is shutting down".into()))
            }
            sent = tx.send(envelope) => {
                sent.map_err(|_| KestrelError::Pool("pool is shutting down".into()))
            }
        }
    }

    fn teardown(&self) -> (Option<mpsc::Sender<Envelope>>, Vec<JoinHandle<()>>) {
        let mut state = self.lock_state();
        (state.task_tx.take(), std::mem::take(&mut state.handles))
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().expect("pool state lock poisoned")
    }
}

async fn worker_loop(
    idx: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Envelope>>>,
    result_tx: mpsc::Sender<TaskResult>,
    cancel: CancellationToken,
    processed: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
) {
    loop {
        // Hold the receiver lock only while waiting for the next envelope,
        // racing the cancellation signal so shutdown never waits on an idle
        // queue.
        let envelope = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                env = rx.recv() => env,
            }
        };
        let Some(envelope) = envelope else { break };

        let outcome = envelope.task.execute(&cancel).await;
        processed.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = &outcome {
            errors.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(worker = idx, task = envelope.task.id(), %err, "task failed");
        }

        let result = TaskResult {
            task_id: envelope.task.id().to_string(),
            error: outcome.err(),
        };

        match envelope.reply {
            Some(reply) => {
                // Caller may have given up waiting; nothing to do then.
                let _ = reply.send(result);
            }
            None => {
                // Publishing also races cancellation so a worker cannot
                // deadlock on a result stream nobody is draining.
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = result_tx.send(result) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
}
