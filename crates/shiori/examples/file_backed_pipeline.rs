//! File-backed pipeline with status polling.
//!
//! This example demonstrates:
//! 1. Defining a weighted pipeline with one artifact in its own category
//! 2. Starting a session that runs in the background
//! 3. Polling the status projection until the run ends
//! 4. Reading an artifact back
//!
//! Checkpoints are written under `./example_data`.

use async_trait::async_trait;
use serde_json::{json, Value};
use shiori::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct CollectStep;

#[async_trait]
impl Step for CollectStep {
    async fn execute(&self, session: &Session) -> Result<Value, WorkflowError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(json!({
            "segment": session.segment,
            "sources": ["catalog", "reviews", "pricing"],
        }))
    }
}

#[derive(Debug)]
struct SummarizeStep;

#[async_trait]
impl Step for SummarizeStep {
    async fn execute(&self, session: &Session) -> Result<Value, WorkflowError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let region = session
            .context
            .get("region")
            .and_then(Value::as_str)
            .unwrap_or("global");
        Ok(json!({
            "headline": format!("{} outlook for {region}", session.segment),
            "confidence": 0.85,
        }))
    }
}

#[tokio::main]
async fn main() -> Result<(), WorkflowError> {
    tracing_subscriber::fmt::init();

    let pipeline = StepPipeline::builder()
        .step("collection", 40, CollectStep)
        .step_in("reports", "summary", 60, SummarizeStep)
        .build()?;

    let store = Arc::new(FileCheckpointStore::new("./example_data"));
    let service = WorkflowService::new(store, pipeline, ServiceConfig::default());

    let ack = service
        .start("outdoor gear", json!({ "region": "south" }))
        .await?;
    println!("Started {} (poll {})", ack.session_id, ack.status_endpoint);

    loop {
        let status = service.status(ack.session_id.as_str()).await?;
        println!(
            "  {:?}: {}% ({} of {} steps)",
            status.state, status.progress_percentage, status.current_step_index, status.total_steps
        );
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let summary = service
        .result(ack.session_id.as_str(), "reports", "summary")
        .await?;
    println!("Summary: {summary}");
    Ok(())
}
