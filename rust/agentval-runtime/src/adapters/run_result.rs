//! Adapter for agent-SDK run results.
//!
//! Agent SDKs in the OpenAI Agents mould hand back a run result with the raw
//! model responses, a list of generated items (tool calls, handoffs,
//! messages) and a final output. Exported as JSON it looks like:
//!
//! ```json
//! {
//!   "raw_responses": [{"model": "gpt-4o", "...": "..."}],
//!   "new_items": [
//!     {"type": "tool_call_item", "name": "web_search", "arguments": "{...}", "output": "..."},
//!     {"type": "handoff_output_item", "source_agent": "triage", "target_agent": "billing"},
//!     {"type": "message_output_item", "content": "..."}
//!   ],
//!   "final_output": "..."
//! }
//! ```

use super::Adapter;
use crate::capture::{local_stack, TraceHandle};
use agentval_core::{Payload, Result, Step, StepType, Trace, TraceError};
use serde_json::Value;
use tracing::debug;

const RAW_EXCERPT: usize = 500;
const FINAL_OUTPUT_EXCERPT: usize = 1000;

#[derive(Debug, Clone)]
pub struct RunResultAdapter {
    trace_name: String,
    adapter_id: String,
}

impl Default for RunResultAdapter {
    fn default() -> Self {
        Self::new("agent_run")
    }
}

impl RunResultAdapter {
    pub fn new(trace_name: impl Into<String>) -> Self {
        Self {
            trace_name: trace_name.into(),
            adapter_id: "run_result".to_string(),
        }
    }

    /// Tag recorded in trace and step metadata under `"adapter"`.
    pub fn with_adapter_id(mut self, adapter_id: impl Into<String>) -> Self {
        self.adapter_id = adapter_id.into();
        self
    }

    fn adapter_metadata(&self) -> Payload {
        let mut metadata = Payload::new();
        metadata.insert("adapter".to_string(), Value::String(self.adapter_id.clone()));
        metadata
    }

    /// Convert a run-result document into a sealed trace. Model responses
    /// come first, then the generated items in order.
    pub fn from_run_result(&self, result: &Value) -> Trace {
        let mut trace = Trace::new(self.trace_name.clone()).with_metadata(self.adapter_metadata());

        for response in array_field(result, "raw_responses") {
            let mut step = Step::new("llm_call", StepType::LlmCall)
                .with_metadata(self.adapter_metadata());
            step.set_input(
                "model",
                Value::String(str_field(response, "model").unwrap_or("unknown").to_string()),
            );
            step.set_output("raw", Value::String(truncate(&render(response), RAW_EXCERPT)));
            trace.add_step(step);
        }

        for item in array_field(result, "new_items") {
            match self.convert_item(item) {
                Some(step) => trace.add_step(step),
                None => debug!(item = %truncate(&render(item), 80), "skipping unrecognized run item"),
            }
        }

        if let Some(final_output) = result.get("final_output").filter(|v| is_truthy(v)) {
            trace.metadata.insert(
                "final_output".to_string(),
                Value::String(truncate(&render(final_output), FINAL_OUTPUT_EXCERPT)),
            );
        }

        trace.seal();
        trace
    }

    fn convert_item(&self, item: &Value) -> Option<Step> {
        let item_type = str_field(item, "type")?;
        let kind = item_type.to_ascii_lowercase();

        let mut step = if kind.contains("tool_call") || kind.contains("toolcall") {
            let name = str_field(item, "name").unwrap_or(item_type);
            let mut step = Step::new(name, StepType::ToolCall);
            step.set_input("arguments", field_or_empty(item, "arguments"));
            step.set_output("output", field_or_empty(item, "output"));
            if let Some(error) = str_field(item, "error") {
                step = step.fail(error);
            }
            step
        } else if kind.contains("handoff") {
            let source = str_field(item, "source_agent").unwrap_or("unknown");
            let target = str_field(item, "target_agent").unwrap_or("unknown");
            let mut step = Step::new(format!("handoff_{}", target), StepType::Handoff);
            step.set_input("source", Value::String(source.to_string()));
            step.set_output("target", Value::String(target.to_string()));
            step
        } else if kind.contains("message") {
            let content = match item.get("content") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => render(other),
                None => String::new(),
            };
            let mut step = Step::new("llm_response", StepType::LlmCall);
            step.set_output("content", Value::String(truncate(&content, RAW_EXCERPT)));
            step
        } else {
            return None;
        };

        let mut metadata = self.adapter_metadata();
        metadata.insert("item_type".to_string(), Value::String(item_type.to_string()));
        step.metadata = metadata;
        Some(step)
    }
}

impl Adapter for RunResultAdapter {
    fn capture_run<R>(&self, body: impl FnOnce(&TraceHandle) -> R) -> (Trace, R) {
        let scope = local_stack().open(self.trace_name.clone(), self.adapter_metadata());
        let result = body(&scope.trace());
        (scope.finish(), result)
    }

    /// Accepts either a run-result document or a trace already in the
    /// persisted format.
    fn parse_trace(&self, raw: &Value) -> Result<Trace> {
        let Some(object) = raw.as_object() else {
            return Err(TraceError::UnrecognizedFormat(format!(
                "expected a JSON object, got {}",
                json_kind(raw)
            )));
        };
        if ["raw_responses", "new_items", "final_output"]
            .iter()
            .any(|key| object.contains_key(*key))
        {
            return Ok(self.from_run_result(raw));
        }
        Trace::from_value(raw.clone())
    }
}

fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn field_or_empty(value: &Value, key: &str) -> Value {
    value
        .get(key)
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
