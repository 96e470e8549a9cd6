//! The ordered execution record of one agent run, and its read-only query
//! surface.

use crate::step::{new_trace_id, now_timestamp, Payload, Step, StepType};
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// A complete execution trace of an agent workflow.
///
/// `steps` is append-only while a capture scope is open; insertion order is
/// the canonical execution order. `end_time` stays `None` until the trace is
/// sealed, after which no capture API appends to it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    #[serde(default = "new_trace_id")]
    pub trace_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "now_timestamp")]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub metadata: Payload,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Trace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            trace_id: new_trace_id(),
            name: name.into(),
            start_time: now_timestamp(),
            end_time: None,
            metadata: Payload::new(),
            steps: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Payload) -> Self {
        self.metadata = metadata;
        self
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn add_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Stamp `end_time` with the current wall-clock time. Never earlier than
    /// `start_time`, even if the clock stepped backwards in between.
    pub fn seal(&mut self) {
        self.end_time = Some(now_timestamp().max(self.start_time));
    }

    pub fn is_sealed(&self) -> bool {
        self.end_time.is_some()
    }

    /// Wall time between start and seal, in milliseconds.
    pub fn duration_ms(&self) -> Option<f64> {
        self.end_time.map(|end| (end - self.start_time) * 1000.0)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Name if set, otherwise the trace id.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.trace_id
        } else {
            &self.name
        }
    }

    // -----------------------------------------------------------------------
    // Query surface
    // -----------------------------------------------------------------------

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn tool_calls(&self) -> Vec<&Step> {
        self.find_steps_by_type(StepType::ToolCall)
    }

    pub fn llm_calls(&self) -> Vec<&Step> {
        self.find_steps_by_type(StepType::LlmCall)
    }

    pub fn failed_steps(&self) -> Vec<&Step> {
        self.steps.iter().filter(|s| s.failed()).collect()
    }

    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(Step::failed)
    }

    /// First step with the given name, in trace order.
    pub fn find_step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Index of the first step with the given name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    pub fn find_steps(&self, name: &str) -> Vec<&Step> {
        self.steps.iter().filter(|s| s.name == name).collect()
    }

    pub fn find_steps_by_type(&self, step_type: StepType) -> Vec<&Step> {
        self.steps
            .iter()
            .filter(|s| s.step_type == step_type)
            .collect()
    }

    pub fn find_by_id(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    /// Steps whose `parent_id` equals `parent_id`, in trace order.
    pub fn children(&self, parent_id: &str) -> Vec<&Step> {
        self.steps
            .iter()
            .filter(|s| s.parent_id.as_deref() == Some(parent_id))
            .collect()
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new("")
    }
}

impl Index<usize> for Trace {
    type Output = Step;

    fn index(&self, index: usize) -> &Step {
        &self.steps[index]
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
