//! End-to-end demo: a document-processing queue with simulated handlers.
//!
//! Run with: cargo run -p pressroom-queue --example document_pipeline

use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use pressroom_queue::{QueueConfig, QueueError, ShutdownMode, TaskQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let queue = TaskQueue::new(
        QueueConfig::default()
            .with_max_workers(3)
            .with_max_queue_size(8)
            .with_shutdown(ShutdownMode::Drain),
    );

    // Stand-ins for the real handlers: OCR subprocess, HTML→PPTX converter,
    // object-storage upload.
    queue.register("ocr", |params| async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        Ok(json!({"file": params["file"], "text": "extracted text", "confidence": 0.97}))
    });
    queue.register("convert", |params| async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        Ok(json!({"file": params["file"], "pages": 12}))
    });
    queue.register("upload", |params| async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        if params["bucket"].is_null() {
            anyhow::bail!("no bucket configured");
        }
        Ok(json!({"url": format!("https://cdn.example/{}", params["key"].as_str().unwrap_or("?"))}))
    });

    queue.start().await;

    // Submit a burst of work; excess is shed with QueueFull.
    let mut submitted = Vec::new();
    for n in 0..12 {
        let id = Uuid::now_v7().to_string();
        let (task_type, params) = match n % 3 {
            0 => ("ocr", json!({"file": format!("scan-{n}.png")})),
            1 => ("convert", json!({"file": format!("deck-{n}.html")})),
            _ => ("upload", json!({"key": format!("out-{n}.pptx"), "bucket": "decks"})),
        };
        match queue.submit(id.clone(), task_type, params).await {
            Ok(_) => submitted.push(id),
            Err(QueueError::QueueFull(cap)) => {
                println!("shedding load: buffer at capacity {cap}");
            }
            Err(e) => return Err(e.into()),
        }
    }

    // Poll like an HTTP status endpoint would.
    loop {
        let status = queue.status();
        println!(
            "processing={} pending={} completed={} failed={}",
            status.processing_count,
            status.pending_count,
            status.total_completed,
            status.total_failed
        );
        if status.total_completed + status.total_failed >= submitted.len() as u64 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    for id in &submitted {
        if let Some(task) = queue.get(id) {
            println!(
                "{} [{}] -> {} ({}ms queued, {}ms running)",
                task.id,
                task.task_type,
                task.status,
                task.wait_time().map(|d| d.num_milliseconds()).unwrap_or(0),
                task.run_time().map(|d| d.num_milliseconds()).unwrap_or(0),
            );
        }
    }

    queue.stop().await?;
    Ok(())
}
