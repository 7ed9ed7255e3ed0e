//! Task entity and lifecycle state machine

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a task.
///
/// Tasks only ever move forward: `Pending → Processing → Completed | Failed`.
/// There is no cancelled state and no transition back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted and waiting in the buffer
    Pending,

    /// Picked up by a worker, handler in flight
    Processing,

    /// Handler returned normally
    Completed,

    /// Handler returned an error
    Failed,
}

impl TaskStatus {
    /// Whether this status admits no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One unit of submitted work.
///
/// Identity (`id`, `task_type`, `params`) is fixed at submission; everything
/// else is lifecycle state owned by the queue. `result` is set only on
/// [`TaskStatus::Completed`], `error` only on [`TaskStatus::Failed`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Caller-supplied identifier. Uniqueness is the caller's contract.
    pub id: String,

    /// Label selecting the registered handler.
    pub task_type: String,

    /// Opaque input, passed verbatim to the handler.
    pub params: serde_json::Value,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// Handler output, present once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Failure description, present once failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the task was submitted.
    pub created_at: DateTime<Utc>,

    /// When a worker picked the task up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the task reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new task in `Pending` state.
    pub fn new(
        id: impl Into<String>,
        task_type: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            params,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Whether the task has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transition to `Processing` and stamp `started_at`.
    ///
    /// Ignored if the task already left `Pending`.
    pub fn start(&mut self) {
        if self.status != TaskStatus::Pending {
            return;
        }
        self.status = TaskStatus::Processing;
        self.started_at = Some(Utc::now());
    }

    /// Transition to `Completed` with the handler's output.
    ///
    /// Ignored if the task is already terminal.
    pub fn complete(&mut self, result: serde_json::Value) {
        if self.is_terminal() {
            return;
        }
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
    }

    /// Transition to `Failed` with a failure description.
    ///
    /// Ignored if the task is already terminal.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Time spent waiting in the buffer (created → started).
    pub fn wait_time(&self) -> Option<Duration> {
        self.started_at.map(|s| s - self.created_at)
    }

    /// Time spent in the handler (started → completed).
    pub fn run_time(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(s), Some(c)) => Some(c - s),
            _ => None,
        }
    }
}
