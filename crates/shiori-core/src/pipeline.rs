//! Ordered step definitions shared by every session.

use crate::checkpoint::{Category, RESERVED_STEPS, WORKFLOW_CATEGORY};
use crate::error::WorkflowError;
use crate::step::{Step, StepName};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// One named step of a pipeline.
#[derive(Debug, Clone)]
pub struct StepDefinition {
    /// Step name, unique within the pipeline.
    pub name: StepName,
    /// Category the step's checkpoint is written under.
    pub category: Category,
    /// Share of overall progress credited when the step completes (0..=100).
    pub progress_weight: u8,
    /// The action executed for each session.
    pub action: Arc<dyn Step>,
}

/// A static, ordered sequence of steps.
///
/// The pipeline holds no per-session state; one instance is reused for
/// every session that runs it.
#[derive(Clone)]
pub struct StepPipeline {
    steps: Vec<StepDefinition>,
}

impl fmt::Debug for StepPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepPipeline")
            .field(
                "steps",
                &self.steps.iter().map(|s| &s.name).collect::<Vec<_>>(),
            )
            .field("total_weight", &self.total_weight())
            .finish()
    }
}

impl StepPipeline {
    /// Creates a new pipeline builder.
    pub fn builder() -> StepPipelineBuilder {
        StepPipelineBuilder::new()
    }

    /// Returns the steps in execution order.
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if the pipeline has no steps. Built pipelines never are.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Looks a step up by name.
    pub fn step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.name.as_str() == name)
    }

    /// Sum of all step weights.
    pub fn total_weight(&self) -> u32 {
        self.steps.iter().map(|s| u32::from(s.progress_weight)).sum()
    }

    /// Distinct categories used by the steps, in first-use order.
    pub fn categories(&self) -> Vec<Category> {
        let mut seen = HashSet::new();
        self.steps
            .iter()
            .filter(|s| seen.insert(s.category.clone()))
            .map(|s| s.category.clone())
            .collect()
    }

    /// Progress credited once the first `completed` steps have finished.
    ///
    /// Computed as `100 * weight(first completed steps) / total_weight`,
    /// rounded down. A pipeline whose weights sum to zero reports 0 until
    /// every step is complete, then 100.
    pub fn progress_percentage(&self, completed: usize) -> u8 {
        let completed = completed.min(self.steps.len());
        let total = self.total_weight();
        if total == 0 {
            return if completed == self.steps.len() { 100 } else { 0 };
        }
        let done: u32 = self.steps[..completed]
            .iter()
            .map(|s| u32::from(s.progress_weight))
            .sum();
        ((100 * done) / total).min(100) as u8
    }
}

/// Builder for constructing [`StepPipeline`] instances.
#[derive(Default)]
pub struct StepPipelineBuilder {
    steps: Vec<StepDefinition>,
}

impl StepPipelineBuilder {
    /// Creates a new empty builder.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Appends a step whose checkpoint lives in the `workflow` category.
    pub fn step<S: Step + 'static>(
        self,
        name: impl Into<StepName>,
        progress_weight: u8,
        action: S,
    ) -> Self {
        self.step_in(WORKFLOW_CATEGORY, name, progress_weight, action)
    }

    /// Appends a step whose checkpoint lives in `category`.
    pub fn step_in<S: Step + 'static>(
        mut self,
        category: impl Into<Category>,
        name: impl Into<StepName>,
        progress_weight: u8,
        action: S,
    ) -> Self {
        self.steps.push(StepDefinition {
            name: name.into(),
            category: category.into(),
            progress_weight,
            action: Arc::new(action),
        });
        self
    }

    /// Appends an already shared action.
    pub fn definition(mut self, definition: StepDefinition) -> Self {
        self.steps.push(definition);
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Configuration`] when the pipeline is empty,
    /// a weight exceeds 100, a name repeats, a key component is malformed,
    /// or a step uses a lifecycle name (`initiated`, `completed`, `error`)
    /// in the `workflow` category.
    pub fn build(self) -> Result<StepPipeline, WorkflowError> {
        if self.steps.is_empty() {
            return Err(WorkflowError::Configuration(
                "pipeline must contain at least one step".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for step in &self.steps {
            step.name
                .validate()
                .and_then(|_| step.category.validate())
                .map_err(|e| WorkflowError::Configuration(e.to_string()))?;

            if step.progress_weight > 100 {
                return Err(WorkflowError::Configuration(format!(
                    "step '{}' has weight {} (max 100)",
                    step.name, step.progress_weight
                )));
            }
            if step.category.as_str() == WORKFLOW_CATEGORY
                && RESERVED_STEPS.contains(&step.name.as_str())
            {
                return Err(WorkflowError::Configuration(format!(
                    "step name '{}' is reserved in the '{}' category",
                    step.name, WORKFLOW_CATEGORY
                )));
            }
            if !names.insert(step.name.clone()) {
                return Err(WorkflowError::Configuration(format!(
                    "duplicate step name '{}'",
                    step.name
                )));
            }
        }

        Ok(StepPipeline { steps: self.steps })
    }
}
