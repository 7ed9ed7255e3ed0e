//! Handler contract and registry
//!
//! All real work is performed by handlers the application registers under a
//! task-type label. The queue engine dispatches type-erased async closures;
//! [`TaskHandler`] is typed sugar on top for handlers with concrete
//! input/output shapes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

/// What a handler produces: an opaque JSON result, or a descriptive failure.
pub type HandlerResult = Result<Value, anyhow::Error>;

/// Type-erased async handler function.
///
/// Receives the task's `params` verbatim and resolves to the task's result.
pub type HandlerFn = Arc<
    dyn Fn(Value) -> std::pin::Pin<Box<dyn std::future::Future<Output = HandlerResult> + Send>>
        + Send
        + Sync,
>;

/// A typed unit of work executable by the queue.
///
/// Implementations declare their task-type label and concrete input/output
/// types; [`HandlerRegistry::register_handler`] performs the JSON erasure so
/// the engine never sees the concrete types.
///
/// # Example
///
/// ```ignore
/// struct OcrHandler;
///
/// #[async_trait]
/// impl TaskHandler for OcrHandler {
///     const TYPE: &'static str = "ocr";
///     type Input = OcrRequest;
///     type Output = OcrResponse;
///
///     async fn execute(&self, input: OcrRequest) -> anyhow::Result<OcrResponse> {
///         // invoke the OCR subprocess...
///     }
/// }
/// ```
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Task-type label this handler is registered under.
    const TYPE: &'static str;

    /// Input type, deserialized from the task's `params`.
    type Input: DeserializeOwned + Send;

    /// Output type, serialized into the task's `result`.
    type Output: Serialize + Send;

    /// Perform the work.
    async fn execute(&self, input: Self::Input) -> Result<Self::Output, anyhow::Error>;
}

/// String-keyed registry of task handlers.
///
/// Populated once at startup by the owning application. Registering the same
/// type twice overwrites the prior handler (last write wins).
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerFn>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async closure for a task type.
    pub fn register<F, Fut>(&mut self, task_type: &str, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: HandlerFn = Arc::new(move |params| Box::pin(handler(params)));
        if self
            .handlers
            .insert(task_type.to_string(), handler)
            .is_some()
        {
            debug!(task_type, "handler overwritten");
        } else {
            debug!(task_type, "handler registered");
        }
    }

    /// Register a typed [`TaskHandler`] under its declared type label.
    ///
    /// Params that fail to deserialize into `H::Input` fail the task with a
    /// descriptive error rather than reaching the handler.
    pub fn register_handler<H: TaskHandler>(&mut self, handler: H) {
        let handler = Arc::new(handler);
        self.register(H::TYPE, move |params: Value| {
            let handler = Arc::clone(&handler);
            async move {
                let input: H::Input = serde_json::from_value(params)
                    .map_err(|e| anyhow::anyhow!("invalid params for {}: {}", H::TYPE, e))?;
                let output = handler.execute(input).await?;
                Ok(serde_json::to_value(output)?)
            }
        });
    }

    /// Look up the handler for a task type, cloning the `Arc`.
    pub fn get(&self, task_type: &str) -> Option<HandlerFn> {
        self.handlers.get(task_type).cloned()
    }

    /// Check whether a task type has a handler.
    pub fn contains(&self, task_type: &str) -> bool {
        self.handlers.contains_key(task_type)
    }

    /// Number of registered task types.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// All registered task-type labels.
    pub fn task_types(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(|s| s.as_str())
    }

    /// Immutable snapshot of the dispatch table.
    ///
    /// The worker pool takes one of these at start; entries are `Arc`s, so
    /// this is a cheap map clone.
    pub fn snapshot(&self) -> Arc<HashMap<String, HandlerFn>> {
        Arc::new(self.handlers.clone())
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("task_types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct EchoInput {
        text: String,
    }

    #[derive(Debug, Serialize)]
    struct EchoOutput {
        text: String,
        length: usize,
    }

    struct EchoHandler;

    #[async_trait]
    impl TaskHandler for EchoHandler {
        const TYPE: &'static str = "echo";
        type Input = EchoInput;
        type Output = EchoOutput;

        async fn execute(&self, input: EchoInput) -> Result<EchoOutput, anyhow::Error> {
            Ok(EchoOutput {
                length: input.text.len(),
                text: input.text,
            })
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.is_empty());

        registry.register("noop", |params| async move { Ok(params) });

        assert!(registry.contains("noop"));
        assert!(!registry.contains("unknown"));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("noop").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let mut registry = HandlerRegistry::new();
        registry.register("job", |_| async move { Ok(json!(1)) });
        registry.register("job", |_| async move { Ok(json!(2)) });

        assert_eq!(registry.len(), 1);
        let handler = registry.get("job").unwrap();
        let result = handler(json!({})).await.unwrap();
        assert_eq!(result, json!(2));
    }

    #[tokio::test]
    async fn test_closure_handler_receives_params() {
        let mut registry = HandlerRegistry::new();
        registry.register("double", |params: Value| async move {
            let n = params["n"].as_i64().unwrap_or(0);
            Ok(json!({ "doubled": n * 2 }))
        });

        let handler = registry.get("double").unwrap();
        let result = handler(json!({"n": 21})).await.unwrap();
        assert_eq!(result, json!({"doubled": 42}));
    }

    #[tokio::test]
    async fn test_typed_handler_roundtrip() {
        let mut registry = HandlerRegistry::new();
        registry.register_handler(EchoHandler);

        assert!(registry.contains("echo"));
        let handler = registry.get("echo").unwrap();
        let result = handler(json!({"text": "press"})).await.unwrap();
        assert_eq!(result, json!({"text": "press", "length": 5}));
    }

    #[tokio::test]
    async fn test_typed_handler_rejects_bad_params() {
        let mut registry = HandlerRegistry::new();
        registry.register_handler(EchoHandler);

        let handler = registry.get("echo").unwrap();
        let err = handler(json!({"wrong": true})).await.unwrap_err();
        assert!(err.to_string().contains("invalid params for echo"));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut registry = HandlerRegistry::new();
        registry.register("a", |_| async move { Ok(json!(null)) });

        let snapshot = registry.snapshot();
        registry.register("b", |_| async move { Ok(json!(null)) });

        assert!(snapshot.contains_key("a"));
        assert!(!snapshot.contains_key("b"));
        assert!(registry.contains("b"));
    }

    #[test]
    fn test_debug_lists_types() {
        let mut registry = HandlerRegistry::new();
        registry.register("ocr", |_| async move { Ok(json!(null)) });
        assert!(format!("{registry:?}").contains("ocr"));
    }
}
