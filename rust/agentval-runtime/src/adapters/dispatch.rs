//! Tool dispatch interface, and a dispatcher decorator that records every
//! dispatch as a `tool_call` step.

use crate::capture::{current_trace, encode_args, TraceHandle, TraceStack};
use agentval_core::{Step, StepStatus, StepType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("tool invocation failed: {0}")]
    InvocationFailed(String),
    #[error("policy violation: {0}")]
    PolicyViolation(String),
    #[error("rate limit exceeded for tool: {0}")]
    RateLimit(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool_id: String,
    pub args: serde_json::Value,
}

impl ToolRequest {
    pub fn new(tool_id: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            tool_id: tool_id.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub outputs: serde_json::Value,
    pub latency_ms: u64,
}

/// Tool dispatch trait: implementations route a request to HTTP, MCP or
/// built-in tools.
pub trait ToolDispatcher {
    fn dispatch(&self, request: &ToolRequest) -> Result<ToolResponse, ToolError>;
}

/// Stub tool dispatcher for testing (returns configured responses).
#[derive(Debug, Default)]
pub struct StubDispatcher {
    responses: HashMap<String, Result<serde_json::Value, ToolError>>,
}

impl StubDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_response(&mut self, tool_id: &str, response: serde_json::Value) {
        self.responses.insert(tool_id.to_string(), Ok(response));
    }

    pub fn set_error(&mut self, tool_id: &str, error: ToolError) {
        self.responses.insert(tool_id.to_string(), Err(error));
    }
}

impl ToolDispatcher for StubDispatcher {
    fn dispatch(&self, request: &ToolRequest) -> Result<ToolResponse, ToolError> {
        match self.responses.get(&request.tool_id) {
            Some(Ok(outputs)) => Ok(ToolResponse {
                outputs: outputs.clone(),
                latency_ms: 0,
            }),
            Some(Err(e)) => Err(e.clone()),
            None => Err(ToolError::NotFound(request.tool_id.clone())),
        }
    }
}

/// Wraps a dispatcher so each dispatch made inside a capture scope becomes a
/// `tool_call` step named after the tool id. Outside a scope it forwards
/// untouched.
pub struct TracedDispatcher<D> {
    inner: D,
    stack: Option<TraceStack>,
}

impl<D: ToolDispatcher> TracedDispatcher<D> {
    /// Record into the calling thread's active trace.
    pub fn new(inner: D) -> Self {
        Self { inner, stack: None }
    }

    /// Record into an explicit stack.
    pub fn with_stack(inner: D, stack: TraceStack) -> Self {
        Self {
            inner,
            stack: Some(stack),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    fn active_trace(&self) -> Option<TraceHandle> {
        match &self.stack {
            Some(stack) => stack.current(),
            None => current_trace(),
        }
    }
}

impl<D: ToolDispatcher> ToolDispatcher for TracedDispatcher<D> {
    fn dispatch(&self, request: &ToolRequest) -> Result<ToolResponse, ToolError> {
        let Some(trace) = self.active_trace() else {
            return self.inner.dispatch(request);
        };

        let mut step = Step::new(request.tool_id.clone(), StepType::ToolCall)
            .with_input(encode_args(&request.args));
        let started = Instant::now();
        let outcome = self.inner.dispatch(request);
        step.duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &outcome {
            Ok(response) => {
                step.set_output("result", response.outputs.clone());
                step.metadata.insert(
                    "reported_latency_ms".to_string(),
                    serde_json::Value::from(response.latency_ms),
                );
                step.status = StepStatus::Success;
            }
            Err(e) => {
                step.status = StepStatus::Failed;
                step.error = Some(e.to_string());
            }
        }
        trace.record(step);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentval_core::Payload;
    use serde_json::json;

    #[test]
    fn stub_returns_configured_outputs() {
        let mut stub = StubDispatcher::new();
        stub.set_response("http.get", json!({"status": 200}));
        let response = stub.dispatch(&ToolRequest::new("http.get", json!({}))).unwrap();
        assert_eq!(response.outputs, json!({"status": 200}));
        assert_eq!(
            stub.dispatch(&ToolRequest::new("nope", json!({}))),
            Err(ToolError::NotFound("nope".to_string()))
        );
    }

    #[test]
    fn traced_dispatch_records_success_and_failure() {
        let mut stub = StubDispatcher::new();
        stub.set_response("search", json!(["a", "b"]));
        stub.set_error("delete", ToolError::PolicyViolation("read-only run".into()));

        let stack = TraceStack::new();
        let dispatcher = TracedDispatcher::with_stack(stub, stack.clone());
        let scope = stack.open("dispatch", Payload::new());

        dispatcher
            .dispatch(&ToolRequest::new("search", json!({"q": "rust"})))
            .unwrap();
        let err = dispatcher
            .dispatch(&ToolRequest::new("delete", json!({"id": 7})))
            .unwrap_err();
        assert_eq!(err, ToolError::PolicyViolation("read-only run".into()));

        let trace = scope.finish();
        assert_eq!(trace.step_names(), vec!["search", "delete"]);
        assert_eq!(trace[0].input["kwargs"], json!({"q": "rust"}));
        assert_eq!(trace[0].output["result"], json!(["a", "b"]));
        assert!(trace[1].failed());
        assert_eq!(trace[1].error.as_deref(), Some("policy violation: read-only run"));
    }

    #[test]
    fn each_error_kind_is_recorded_with_its_message() {
        let mut stub = StubDispatcher::new();
        stub.set_error("llm.chat", ToolError::InvocationFailed("upstream 502".into()));
        stub.set_error("http.get", ToolError::RateLimit("http.get".into()));

        let stack = TraceStack::new();
        let dispatcher = TracedDispatcher::with_stack(stub, stack.clone());
        let scope = stack.open("errors", Payload::new());
        for tool in ["llm.chat", "http.get", "missing"] {
            assert!(dispatcher.dispatch(&ToolRequest::new(tool, json!({}))).is_err());
        }
        let trace = scope.finish();

        let errors: Vec<_> = trace.iter().map(|s| s.error.as_deref()).collect();
        assert_eq!(
            errors,
            vec![
                Some("tool invocation failed: upstream 502"),
                Some("rate limit exceeded for tool: http.get"),
                Some("tool not found: missing"),
            ]
        );
        assert!(trace.iter().all(|s| s.failed() && s.output.is_empty()));
    }

    #[test]
    fn traced_dispatch_outside_scope_records_nothing() {
        let mut stub = StubDispatcher::new();
        stub.set_response("ping", json!("pong"));
        let stack = TraceStack::new();
        let dispatcher = TracedDispatcher::with_stack(stub, stack.clone());
        let response = dispatcher.dispatch(&ToolRequest::new("ping", json!(null))).unwrap();
        assert_eq!(response.outputs, json!("pong"));
        assert!(stack.current().is_none());
    }
}
