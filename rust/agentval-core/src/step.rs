//! A single recorded action in an agent trace.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Ordered key/value payload used for step inputs, outputs and metadata.
///
/// Backed by `serde_json::Map` with `preserve_order`, so keys come back out in
/// the order they went in and unknown keys survive a save/load cycle.
pub type Payload = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// StepType
// ---------------------------------------------------------------------------

/// What kind of action a step represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    LlmCall,
    ToolCall,
    Handoff,
    Decision,
    Error,
    Custom,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::LlmCall => "llm_call",
            StepType::ToolCall => "tool_call",
            StepType::Handoff => "handoff",
            StepType::Decision => "decision",
            StepType::Error => "error",
            StepType::Custom => "custom",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "llm_call" => Ok(StepType::LlmCall),
            "tool_call" => Ok(StepType::ToolCall),
            "handoff" => Ok(StepType::Handoff),
            "decision" => Ok(StepType::Decision),
            "error" => Ok(StepType::Error),
            "custom" => Ok(StepType::Custom),
            other => Err(format!("unknown step type '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// StepStatus
// ---------------------------------------------------------------------------

/// Outcome of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Success,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(StepStatus::Success),
            "failed" => Ok(StepStatus::Failed),
            "skipped" => Ok(StepStatus::Skipped),
            other => Err(format!("unknown step status '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One recorded unit of agent behaviour: an LLM call, a tool call, a handoff
/// to another agent, a decision point, an error, or a caller-defined event.
///
/// `step_id` is assigned at construction and never changes. `parent_id` is a
/// lookup reference to another step in the same trace; it carries no
/// ownership and may dangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default = "new_step_id")]
    pub step_id: String,
    pub name: String,
    pub step_type: StepType,
    #[serde(default)]
    pub input: Payload,
    #[serde(default)]
    pub output: Payload,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default = "now_timestamp")]
    pub timestamp: f64,
    #[serde(default)]
    pub duration_ms: f64,
    #[serde(default)]
    pub metadata: Payload,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl Step {
    /// Create a successful step with empty payloads, stamped with the current
    /// wall-clock time and a fresh id.
    pub fn new(name: impl Into<String>, step_type: StepType) -> Self {
        Self {
            step_id: new_step_id(),
            name: name.into(),
            step_type,
            input: Payload::new(),
            output: Payload::new(),
            status: StepStatus::Success,
            error: None,
            timestamp: now_timestamp(),
            duration_ms: 0.0,
            metadata: Payload::new(),
            parent_id: None,
        }
    }

    pub fn with_input(mut self, input: Payload) -> Self {
        self.input = input;
        self
    }

    pub fn with_output(mut self, output: Payload) -> Self {
        self.output = output;
        self
    }

    pub fn with_status(mut self, status: StepStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Payload) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Shorthand for a failed step carrying `error`.
    pub fn fail(self, error: impl Into<String>) -> Self {
        self.with_status(StepStatus::Failed).with_error(error)
    }

    /// Insert a single output entry, keeping any existing keys.
    pub fn set_output(&mut self, key: impl Into<String>, value: Value) {
        self.output.insert(key.into(), value);
    }

    /// Insert a single input entry, keeping any existing keys.
    pub fn set_input(&mut self, key: impl Into<String>, value: Value) {
        self.input.insert(key.into(), value);
    }

    pub fn failed(&self) -> bool {
        self.status == StepStatus::Failed
    }

    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Success
    }

    pub fn skipped(&self) -> bool {
        self.status == StepStatus::Skipped
    }

    pub fn is_tool_call(&self) -> bool {
        self.step_type == StepType::ToolCall
    }

    pub fn is_llm_call(&self) -> bool {
        self.step_type == StepType::LlmCall
    }
}

// ---------------------------------------------------------------------------
// Identity and clock helpers
// ---------------------------------------------------------------------------

/// Fresh 12-hex-char step identifier.
pub fn new_step_id() -> String {
    short_uuid(12)
}

/// Fresh 16-hex-char trace identifier.
pub fn new_trace_id() -> String {
    short_uuid(16)
}

fn short_uuid(len: usize) -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(len);
    id
}

/// Wall-clock seconds since the Unix epoch, with microsecond resolution.
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_step_defaults_to_success() {
        let step = Step::new("search", StepType::ToolCall);
        assert_eq!(step.name, "search");
        assert_eq!(step.status, StepStatus::Success);
        assert!(step.succeeded());
        assert!(!step.failed());
        assert!(step.error.is_none());
        assert_eq!(step.step_id.len(), 12);
        assert!(step.timestamp > 0.0);
    }

    #[test]
    fn fail_sets_status_and_error() {
        let step = Step::new("search", StepType::ToolCall).fail("Connection timeout");
        assert!(step.failed());
        assert!(!step.succeeded());
        assert_eq!(step.error.as_deref(), Some("Connection timeout"));
    }

    #[test]
    fn step_ids_are_distinct() {
        let a = Step::new("a", StepType::Custom);
        let b = Step::new("a", StepType::Custom);
        assert_ne!(a.step_id, b.step_id);
        assert_eq!(new_trace_id().len(), 16);
    }

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for ty in [
            StepType::LlmCall,
            StepType::ToolCall,
            StepType::Handoff,
            StepType::Decision,
            StepType::Error,
            StepType::Custom,
        ] {
            assert_eq!(ty.as_str().parse::<StepType>().unwrap(), ty);
            assert_eq!(serde_json::to_value(ty).unwrap(), json!(ty.as_str()));
        }
        assert_eq!("skipped".parse::<StepStatus>().unwrap(), StepStatus::Skipped);
        assert!("bogus".parse::<StepType>().is_err());
    }

    #[test]
    fn deserialize_fills_missing_optional_fields() {
        let step: Step =
            serde_json::from_value(json!({"name": "plan", "step_type": "decision"})).unwrap();
        assert_eq!(step.status, StepStatus::Success);
        assert!(step.input.is_empty());
        assert!(step.parent_id.is_none());
        assert_eq!(step.duration_ms, 0.0);
        assert_eq!(step.step_id.len(), 12);
    }

    #[test]
    fn deserialize_rejects_unknown_variants() {
        let bad_type = serde_json::from_value::<Step>(json!({"name": "x", "step_type": "dance"}));
        assert!(bad_type.is_err());
        let bad_status = serde_json::from_value::<Step>(
            json!({"name": "x", "step_type": "custom", "status": "meh"}),
        );
        assert!(bad_status.is_err());
    }
}
