//! The market analysis pipeline served by the HTTP API.
//!
//! Steps are placeholders: each waits for the configured delay and
//! returns a payload derived from the session's segment and context.

use async_trait::async_trait;
use serde_json::{json, Value};
use shiori::{Session, Step, StepPipeline, WorkflowError};
use std::fmt;
use std::time::Duration;

type BuildPayload = fn(&Session) -> Value;

/// A step that pauses, then builds its artifact from the session.
#[derive(Clone)]
struct PacedStep {
    delay: Duration,
    build: BuildPayload,
}

impl fmt::Debug for PacedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacedStep")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Step for PacedStep {
    async fn execute(&self, session: &Session) -> Result<Value, WorkflowError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok((self.build)(session))
    }
}

fn collection(session: &Session) -> Value {
    json!({
        "segment": session.segment,
        "sources_consulted": 12,
        "signals": session.context,
    })
}

fn verification(session: &Session) -> Value {
    json!({
        "segment": session.segment,
        "verified": true,
        "confidence": "85%",
    })
}

fn synthesis(session: &Session) -> Value {
    let competitor = session
        .context
        .get("competitor")
        .and_then(Value::as_str)
        .unwrap_or("the market leader");
    json!({
        "segment": session.segment,
        "key_insights": [
            format!("Demand in {} is growing", session.segment),
            format!("Pricing pressure from {competitor}"),
        ],
        "attention_points": ["Customer acquisition cost"],
    })
}

fn generation(session: &Session) -> Value {
    json!({
        "segment": session.segment,
        "modules_generated": 16,
    })
}

fn final_report(session: &Session) -> Value {
    json!({
        "segment": session.segment,
        "session_id": session.session_id,
        "summary": format!("Analysis of {} complete", session.segment),
    })
}

/// Builds the five-step analysis pipeline, 20% per step.
pub fn analysis_pipeline(delay: Duration) -> Result<StepPipeline, WorkflowError> {
    let steps: [(&str, BuildPayload); 5] = [
        ("collection", collection),
        ("verification", verification),
        ("synthesis", synthesis),
        ("generation", generation),
        ("final_report", final_report),
    ];

    steps
        .into_iter()
        .fold(StepPipeline::builder(), |builder, (name, build)| {
            builder.step(name, 20, PacedStep { delay, build })
        })
        .build()
}
