//! # Pressroom Queue
//!
//! A bounded in-process task queue with a fixed-size worker pool, built for
//! decoupling request intake from long-running, externally-executed work
//! (OCR subprocesses, LLM calls, document conversion, uploads).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       TaskQueue                          │
//! │  (submit/get/status, task registry, start/stop lifecycle)│
//! └─────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                  bounded mpsc buffer                     │
//! │        (FIFO, try_send is the capacity check)            │
//! └─────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                  worker pool (N loops)                   │
//! │   (dequeue, run handler, record outcome, retention)      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Submissions are rejected — never queued elsewhere, never blocked — once
//! the buffer is at capacity; callers treat that as a shed-load signal.
//! Finished tasks stay queryable until the retention policy purges them.
//!
//! ## Example
//!
//! ```ignore
//! use pressroom_queue::{QueueConfig, TaskQueue};
//! use serde_json::json;
//!
//! let queue = TaskQueue::new(QueueConfig::default().with_max_workers(4));
//!
//! queue.register("convert", |params| async move {
//!     // run the converter...
//!     Ok(json!({"pages": 12}))
//! });
//!
//! queue.start().await;
//! queue.submit("doc-1", "convert", json!({"file": "deck.html"})).await?;
//! // ... later
//! let task = queue.get("doc-1");
//! queue.stop().await?;
//! ```

pub mod config;
pub mod coordinator;
mod retention;
mod worker;

pub use config::{QueueConfig, ShutdownMode};
pub use coordinator::{QueueError, QueueStatus, TaskQueue};

// Domain types, re-exported for single-crate ergonomics.
pub use pressroom_core::{HandlerFn, HandlerRegistry, HandlerResult, Task, TaskHandler, TaskStatus};
