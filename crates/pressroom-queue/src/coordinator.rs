//! Queue coordinator
//!
//! Owns the task registry and the worker pool lifecycle: accepts
//! submissions against a bounded buffer, starts and stops the workers, and
//! answers status queries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pressroom_core::{HandlerRegistry, HandlerResult, Task, TaskHandler, TaskStatus};

use crate::config::{QueueConfig, ShutdownMode};
use crate::retention::RetentionPolicy;
use crate::worker::{run_worker, WorkerContext};

/// Queue coordinator errors
///
/// These are the rejection errors surfaced synchronously to callers of
/// [`TaskQueue::submit`] and [`TaskQueue::stop`]. Handler failures are never
/// surfaced here — they are recorded on the task itself.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Queue has not been started (or has been stopped)
    #[error("task queue is not running")]
    NotRunning,

    /// No handler registered for the submitted task type
    #[error("no handler registered for task type: {0}")]
    UnregisteredType(String),

    /// Bounded buffer is at capacity; the submission was rejected
    #[error("task queue is full (capacity {0})")]
    QueueFull(usize),

    /// Graceful drain exceeded its deadline; remaining workers were aborted
    #[error("graceful drain timed out")]
    DrainTimeout,
}

/// Point-in-time snapshot of queue state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Whether the worker pool is running.
    pub running: bool,
    /// Configured worker count.
    pub max_workers: usize,
    /// Tasks currently being processed by a worker.
    pub processing_count: usize,
    /// Current buffer occupancy.
    pub queue_size: usize,
    /// Buffer capacity.
    pub max_queue_size: usize,
    /// Tasks submitted but not yet picked up.
    pub pending_count: usize,
    /// Cumulative successful submissions.
    pub total_submitted: u64,
    /// Cumulative completed tasks.
    pub total_completed: u64,
    /// Cumulative failed tasks.
    pub total_failed: u64,
}

/// Cumulative counters, updated by submit and the workers.
pub(crate) struct QueueStats {
    pub(crate) submitted: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
}

impl QueueStats {
    fn new() -> Self {
        Self {
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }
}

/// State that only exists while the pool is running.
struct RunningState {
    submit_tx: mpsc::Sender<String>,
    workers: Vec<JoinHandle<()>>,
}

/// Bounded task queue with a fixed-size worker pool.
///
/// Explicitly constructed and owned by the embedding application; start and
/// stop it alongside process startup/shutdown.
///
/// # Example
///
/// ```ignore
/// use pressroom_queue::{QueueConfig, TaskQueue};
///
/// let queue = TaskQueue::new(QueueConfig::default());
/// queue.register("ocr", |params| async move {
///     // invoke the OCR tool...
///     Ok(serde_json::json!({"text": "..."}))
/// });
///
/// queue.start().await;
/// let task = queue.submit("task-1", "ocr", serde_json::json!({"file": "a.png"})).await?;
/// // ... poll queue.get("task-1") for the outcome
/// queue.stop().await?;
/// ```
pub struct TaskQueue {
    config: QueueConfig,
    handlers: RwLock<HandlerRegistry>,
    tasks: Arc<RwLock<HashMap<String, Task>>>,
    retention: Arc<Mutex<RetentionPolicy>>,
    stats: Arc<QueueStats>,
    shutdown_tx: watch::Sender<bool>,
    state: Mutex<Option<RunningState>>,
}

impl TaskQueue {
    /// Create a stopped queue with the given configuration.
    pub fn new(config: QueueConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            retention: Arc::new(Mutex::new(RetentionPolicy::new(config.max_completed_tasks))),
            config,
            handlers: RwLock::new(HandlerRegistry::new()),
            tasks: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(QueueStats::new()),
            shutdown_tx,
            state: Mutex::new(None),
        }
    }

    /// Register an async closure for a task type.
    ///
    /// Expected before [`start`](Self::start): the pool dispatches from a
    /// snapshot taken when it launches. Last write wins.
    pub fn register<F, Fut>(&self, task_type: &str, handler: F)
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers.write().register(task_type, handler);
    }

    /// Register a typed [`TaskHandler`] under its declared type label.
    pub fn register_handler<H: TaskHandler>(&self, handler: H) {
        self.handlers.write().register_handler(handler);
    }

    /// Launch the worker pool. Idempotent no-op if already running.
    pub async fn start(&self) {
        let mut state = self.state.lock();
        if state.is_some() {
            debug!("task queue already running");
            return;
        }

        let (submit_tx, submit_rx) = mpsc::channel::<String>(self.config.max_queue_size.max(1));
        let submit_rx = Arc::new(tokio::sync::Mutex::new(submit_rx));
        self.shutdown_tx.send_replace(false);

        let handlers = self.handlers.read().snapshot();
        let worker_count = self.config.max_workers.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let ctx = WorkerContext {
                handlers: Arc::clone(&handlers),
                tasks: Arc::clone(&self.tasks),
                retention: Arc::clone(&self.retention),
                stats: Arc::clone(&self.stats),
            };
            workers.push(tokio::spawn(run_worker(
                worker_id,
                Arc::clone(&submit_rx),
                self.shutdown_tx.subscribe(),
                ctx,
            )));
        }

        *state = Some(RunningState { submit_tx, workers });
        info!(
            max_workers = worker_count,
            max_queue_size = self.config.max_queue_size,
            handler_types = handlers.len(),
            "task queue started"
        );
    }

    /// Stop the worker pool and wait for worker termination.
    ///
    /// Behavior for in-flight tasks depends on [`QueueConfig::shutdown`]:
    /// under [`ShutdownMode::Abort`] they are abandoned in `Processing`,
    /// under [`ShutdownMode::Drain`] they finish first (bounded by
    /// `drain_timeout`). Idempotent no-op if not running.
    pub async fn stop(&self) -> Result<(), QueueError> {
        let Some(RunningState { submit_tx, workers }) = self.state.lock().take() else {
            debug!("task queue already stopped");
            return Ok(());
        };

        info!(mode = ?self.config.shutdown, "stopping task queue");
        self.shutdown_tx.send_replace(true);
        // Close intake so blocked receivers observe the end of the stream.
        drop(submit_tx);

        match self.config.shutdown {
            ShutdownMode::Abort => {
                for worker in &workers {
                    worker.abort();
                }
                join_all(workers).await;
                info!("task queue stopped");
                Ok(())
            }
            ShutdownMode::Drain => {
                let deadline = tokio::time::Instant::now() + self.config.drain_timeout;
                let mut timed_out = false;
                for mut worker in workers {
                    match tokio::time::timeout_at(deadline, &mut worker).await {
                        Ok(_) => {}
                        Err(_) => {
                            worker.abort();
                            let _ = worker.await;
                            timed_out = true;
                        }
                    }
                }
                if timed_out {
                    warn!("drain deadline exceeded, aborted remaining workers");
                    return Err(QueueError::DrainTimeout);
                }
                info!("task queue drained and stopped");
                Ok(())
            }
        }
    }

    /// Submit a task for execution.
    ///
    /// Rejected with [`QueueError::NotRunning`] before `start()`, with
    /// [`QueueError::UnregisteredType`] if no handler is registered for
    /// `task_type`, and with [`QueueError::QueueFull`] when the buffer is at
    /// capacity — a rejected submission never creates a task. On success the
    /// returned snapshot is in `Pending` state; poll [`get`](Self::get) for
    /// the outcome.
    pub async fn submit(
        &self,
        id: impl Into<String>,
        task_type: &str,
        params: serde_json::Value,
    ) -> Result<Task, QueueError> {
        let id = id.into();
        let state = self.state.lock();
        let Some(state) = state.as_ref() else {
            return Err(QueueError::NotRunning);
        };

        if !self.handlers.read().contains(task_type) {
            return Err(QueueError::UnregisteredType(task_type.to_string()));
        }

        let task = Task::new(id.clone(), task_type, params);

        // Insert before enqueue so a worker can never dequeue an id it
        // cannot resolve; rolled back if the buffer rejects the id.
        let previous = self.tasks.write().insert(id.clone(), task.clone());

        if let Err(err) = state.submit_tx.try_send(id.clone()) {
            let mut tasks = self.tasks.write();
            match previous {
                Some(prev) => {
                    tasks.insert(id.clone(), prev);
                }
                None => {
                    tasks.remove(&id);
                }
            }
            return match err {
                mpsc::error::TrySendError::Full(_) => {
                    warn!(task_id = %id, "submission rejected: queue full");
                    Err(QueueError::QueueFull(self.config.max_queue_size))
                }
                mpsc::error::TrySendError::Closed(_) => Err(QueueError::NotRunning),
            };
        }

        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(
            task_id = %id,
            task_type,
            queue_size = buffer_occupancy(&state.submit_tx),
            "task submitted"
        );
        Ok(task)
    }

    /// Look up a task by id.
    ///
    /// `None` if the id was never submitted or the task has been evicted by
    /// the retention policy — never an error.
    pub fn get(&self, id: &str) -> Option<Task> {
        self.tasks.read().get(id).cloned()
    }

    /// Whether the worker pool is running.
    pub fn is_running(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Number of tasks currently tracked in the registry (any status).
    pub fn tracked_tasks(&self) -> usize {
        self.tasks.read().len()
    }

    /// Snapshot of queue state and cumulative counters.
    pub fn status(&self) -> QueueStatus {
        let (running, queue_size) = match self.state.lock().as_ref() {
            Some(state) => (true, buffer_occupancy(&state.submit_tx)),
            None => (false, 0),
        };

        let (pending_count, processing_count) = {
            let tasks = self.tasks.read();
            tasks.values().fold((0, 0), |(pending, processing), task| {
                match task.status {
                    TaskStatus::Pending => (pending + 1, processing),
                    TaskStatus::Processing => (pending, processing + 1),
                    _ => (pending, processing),
                }
            })
        };

        QueueStatus {
            running,
            max_workers: self.config.max_workers,
            processing_count,
            queue_size,
            max_queue_size: self.config.max_queue_size,
            pending_count,
            total_submitted: self.stats.submitted.load(Ordering::Relaxed),
            total_completed: self.stats.completed.load(Ordering::Relaxed),
            total_failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }
}

/// How many ids sit in the bounded buffer right now.
fn buffer_occupancy(tx: &mpsc::Sender<String>) -> usize {
    tx.max_capacity() - tx.capacity()
}
