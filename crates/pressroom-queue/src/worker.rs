//! Worker loop
//!
//! Each worker pulls task ids from the shared buffer, runs the registered
//! handler, and records the outcome on the task. Workers are identical and
//! interchangeable; the one that holds the receiver lock gets the next task.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use pressroom_core::{HandlerFn, Task};

use crate::coordinator::QueueStats;
use crate::retention::RetentionPolicy;

/// Shared state a worker needs to process tasks.
pub(crate) struct WorkerContext {
    /// Dispatch table snapshot taken at start().
    pub(crate) handlers: Arc<HashMap<String, HandlerFn>>,
    pub(crate) tasks: Arc<RwLock<HashMap<String, Task>>>,
    pub(crate) retention: Arc<Mutex<RetentionPolicy>>,
    pub(crate) stats: Arc<QueueStats>,
}

/// Run one worker loop until shutdown is signalled or the buffer closes.
pub(crate) async fn run_worker(
    worker_id: usize,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<String>>>,
    mut shutdown_rx: watch::Receiver<bool>,
    ctx: WorkerContext,
) {
    debug!(worker_id, "worker started");

    loop {
        // Take the next task id, staying responsive to the stop signal.
        // The shutdown arm wins when both are ready, so a drain never picks
        // up queued backlog after stop() has been called.
        let next = {
            let mut queue = queue.lock().await;
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => None,
                task_id = queue.recv() => task_id,
            }
        };

        let Some(task_id) = next else { break };
        process_task(worker_id, &task_id, &ctx).await;
    }

    debug!(worker_id, "worker stopped");
}

/// Execute one task: transition to processing, invoke the handler, record
/// the terminal outcome, and notify the retention policy.
async fn process_task(worker_id: usize, task_id: &str, ctx: &WorkerContext) {
    let (task_type, params) = {
        let mut tasks = ctx.tasks.write();
        let Some(task) = tasks.get_mut(task_id) else {
            warn!(worker_id, task_id, "dequeued id with no registry entry");
            return;
        };
        task.start();
        (task.task_type.clone(), task.params.clone())
    };

    info!(worker_id, task_id, %task_type, "task started");

    let outcome = match ctx.handlers.get(&task_type) {
        Some(handler) => handler(params).await,
        // Registered on the coordinator after start(): submit accepted it,
        // but the pool dispatches from its startup snapshot.
        None => Err(anyhow::anyhow!(
            "no handler registered for task type: {task_type}"
        )),
    };

    {
        let mut tasks = ctx.tasks.write();
        if let Some(task) = tasks.get_mut(task_id) {
            match outcome {
                Ok(result) => {
                    task.complete(result);
                    ctx.stats.completed.fetch_add(1, Ordering::Relaxed);
                    info!(
                        worker_id,
                        task_id,
                        elapsed_ms = run_time_ms(task),
                        "task completed"
                    );
                }
                Err(err) => {
                    task.fail(format!("{err:#}"));
                    ctx.stats.failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        worker_id,
                        task_id,
                        elapsed_ms = run_time_ms(task),
                        error = %err,
                        "task failed"
                    );
                }
            }
        } else {
            warn!(worker_id, task_id, "task vanished during processing");
        }
    }

    let purged = {
        let mut retention = ctx.retention.lock();
        retention.record(task_id);
        let mut tasks = ctx.tasks.write();
        retention.sweep(&mut tasks)
    };
    if purged > 0 {
        info!(purged, "purged old terminal tasks");
    }
}

fn run_time_ms(task: &Task) -> i64 {
    task.run_time().map(|d| d.num_milliseconds()).unwrap_or(0)
}
