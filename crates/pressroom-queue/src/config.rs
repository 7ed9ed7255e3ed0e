//! Queue configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What `stop()` does to workers that are mid-task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownMode {
    /// Cancel worker loops immediately. A task whose handler is in flight is
    /// abandoned in `Processing` with no terminal transition — the legacy
    /// behavior, reproduced deliberately.
    #[default]
    Abort,

    /// Let each worker finish its in-flight task before exiting, bounded by
    /// `drain_timeout`. Queued-but-unstarted tasks stay `Pending`.
    Drain,
}

/// Task queue configuration
///
/// # Example
///
/// ```
/// use pressroom_queue::config::{QueueConfig, ShutdownMode};
///
/// let config = QueueConfig::default()
///     .with_max_workers(5)
///     .with_max_queue_size(200)
///     .with_shutdown(ShutdownMode::Drain);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of concurrent worker loops.
    pub max_workers: usize,

    /// Capacity of the bounded buffer; submissions beyond it are rejected.
    pub max_queue_size: usize,

    /// How many terminal tasks the retention policy keeps reachable.
    pub max_completed_tasks: usize,

    /// Shutdown behavior for `stop()`.
    pub shutdown: ShutdownMode,

    /// Deadline for a graceful drain (only used with [`ShutdownMode::Drain`]).
    #[serde(with = "duration_millis")]
    pub drain_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            max_queue_size: 100,
            max_completed_tasks: 1000,
            shutdown: ShutdownMode::default(),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

impl QueueConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count (at least 1).
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    /// Set the buffer capacity (at least 1).
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size.max(1);
        self
    }

    /// Set how many terminal tasks stay reachable after the sweep.
    pub fn with_max_completed_tasks(mut self, count: usize) -> Self {
        self.max_completed_tasks = count;
        self
    }

    /// Set the shutdown behavior.
    pub fn with_shutdown(mut self, mode: ShutdownMode) -> Self {
        self.shutdown = mode;
        self
    }

    /// Set the graceful drain deadline.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.max_queue_size, 100);
        assert_eq!(config.max_completed_tasks, 1000);
        assert_eq!(config.shutdown, ShutdownMode::Abort);
        assert_eq!(config.drain_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_builder() {
        let config = QueueConfig::new()
            .with_max_workers(8)
            .with_max_queue_size(50)
            .with_max_completed_tasks(10)
            .with_shutdown(ShutdownMode::Drain)
            .with_drain_timeout(Duration::from_secs(5));

        assert_eq!(config.max_workers, 8);
        assert_eq!(config.max_queue_size, 50);
        assert_eq!(config.max_completed_tasks, 10);
        assert_eq!(config.shutdown, ShutdownMode::Drain);
        assert_eq!(config.drain_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_clamps_to_one() {
        let config = QueueConfig::new().with_max_workers(0).with_max_queue_size(0);
        assert_eq!(config.max_workers, 1);
        assert_eq!(config.max_queue_size, 1);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = QueueConfig::new()
            .with_shutdown(ShutdownMode::Drain)
            .with_drain_timeout(Duration::from_millis(1500));

        let json = serde_json::to_string(&config).expect("serialize");
        assert!(json.contains("\"drain_timeout\":1500"));
        assert!(json.contains("\"shutdown\":\"drain\""));

        let back: QueueConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }
}
