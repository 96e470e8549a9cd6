//! Behavioural assertions over a captured trace.
//!
//! Every check returns `Ok(())` on success or an [`AssertionFailure`]
//! describing what was expected, what actually happened, and (where one is
//! involved) the offending step. None of them mutate the trace.
//!
//! ```rust
//! use agentval_core::{Step, StepType, Trace};
//! use agentval_runtime::assertions::{step_order, tool_called};
//!
//! let mut trace = Trace::new("demo");
//! trace.add_step(Step::new("search", StepType::ToolCall));
//! trace.add_step(Step::new("answer", StepType::LlmCall));
//!
//! tool_called(&trace, "search", Some(1)).unwrap();
//! step_order(&trace, &["search", "answer"]).unwrap();
//! assert!(tool_called(&trace, "delete", None).is_err());
//! ```

use agentval_core::{Payload, Step, StepType, Trace};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Longest output excerpt included in a failure message.
const OUTPUT_EXCERPT: usize = 500;

/// A failed behavioural assertion.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AssertionFailure {
    pub message: String,
    /// The step the failure is about, if any.
    pub step: Option<Step>,
    pub trace_id: String,
    pub trace_name: String,
}

impl AssertionFailure {
    fn new(trace: &Trace, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            step: None,
            trace_id: trace.trace_id.clone(),
            trace_name: trace.name.clone(),
        }
    }

    fn at(mut self, step: &Step) -> Self {
        self.step = Some(step.clone());
        self
    }
}

pub type AssertResult = Result<(), AssertionFailure>;

struct NameList<'a>(Vec<&'a str>);

impl fmt::Display for NameList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, name) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "'{}'", name)?;
        }
        write!(f, "]")
    }
}

fn tool_calls_named<'t>(trace: &'t Trace, tool_name: &str) -> Vec<&'t Step> {
    trace
        .iter()
        .filter(|s| s.step_type == StepType::ToolCall && s.name == tool_name)
        .collect()
}

// ---------------------------------------------------------------------------
// Tool calls
// ---------------------------------------------------------------------------

/// The tool was called at least once, or exactly `times` times if given.
pub fn tool_called(trace: &Trace, tool_name: &str, times: Option<usize>) -> AssertResult {
    let calls = tool_calls_named(trace, tool_name);
    if calls.is_empty() {
        let called = NameList(trace.tool_calls().iter().map(|s| s.name.as_str()).collect());
        return Err(AssertionFailure::new(
            trace,
            format!(
                "Expected tool '{}' to be called, but it was never called.\nTools that were called: {}",
                tool_name, called
            ),
        ));
    }
    match times {
        Some(expected) if calls.len() != expected => Err(AssertionFailure::new(
            trace,
            format!(
                "Expected tool '{}' to be called {} time(s), but it was called {} time(s).",
                tool_name,
                expected,
                calls.len()
            ),
        )),
        _ => Ok(()),
    }
}

pub fn tool_not_called(trace: &Trace, tool_name: &str) -> AssertResult {
    let calls = tool_calls_named(trace, tool_name);
    match calls.first() {
        None => Ok(()),
        Some(first) => Err(AssertionFailure::new(
            trace,
            format!(
                "Expected tool '{}' to NOT be called, but it was called {} time(s).",
                tool_name,
                calls.len()
            ),
        )
        .at(first)),
    }
}

/// Some call to the tool had every `expected` key with an equal value in
/// its `kwargs` input. Extra keys in the actual call are ignored.
pub fn tool_called_with(trace: &Trace, tool_name: &str, expected: &Payload) -> AssertResult {
    let calls = tool_calls_named(trace, tool_name);
    if calls.is_empty() {
        return Err(AssertionFailure::new(
            trace,
            format!(
                "Expected tool '{}' to be called, but it was never called.",
                tool_name
            ),
        ));
    }
    let matched = calls.iter().any(|call| {
        let kwargs = call.input.get("kwargs").and_then(Value::as_object);
        expected
            .iter()
            .all(|(k, v)| kwargs.and_then(|kw| kw.get(k)) == Some(v))
    });
    if matched {
        return Ok(());
    }
    let actual: Vec<String> = calls
        .iter()
        .map(|c| Value::Object(c.input.clone()).to_string())
        .collect();
    Err(AssertionFailure::new(
        trace,
        format!(
            "Tool '{}' was called but never with expected args {}.\nActual calls: [{}]",
            tool_name,
            Value::Object(expected.clone()),
            actual.join(", ")
        ),
    ))
}

/// No tool call repeats back-to-back more than `max_repeats` times.
pub fn no_repeated_tool_calls(trace: &Trace, tool_name: &str, max_repeats: usize) -> AssertResult {
    let mut consecutive = 0;
    for step in trace {
        if step.step_type == StepType::ToolCall && step.name == tool_name {
            consecutive += 1;
            if consecutive > max_repeats {
                return Err(AssertionFailure::new(
                    trace,
                    format!(
                        "Tool '{}' was called {} times consecutively (max allowed: {}). Possible infinite loop.",
                        tool_name, consecutive, max_repeats
                    ),
                )
                .at(step));
            }
        } else {
            consecutive = 0;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// The named steps occur in this relative order. Other steps may appear
/// in between.
pub fn step_order(trace: &Trace, expected_order: &[&str]) -> AssertResult {
    let names = trace.step_names();
    let mut next = 0;
    for expected in expected_order {
        match names[next..].iter().position(|name| name == expected) {
            Some(offset) => next += offset + 1,
            None => {
                let after = match next {
                    0 => "the start of the trace".to_string(),
                    n => format!("index {}", n - 1),
                };
                return Err(AssertionFailure::new(
                    trace,
                    format!(
                        "Expected step '{}' to appear after {}, but it was not found.\nExpected order: {}\nActual steps: {}",
                        expected,
                        after,
                        NameList(expected_order.to_vec()),
                        NameList(names.clone())
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// The trace consists of exactly these steps, in this order.
pub fn exact_step_order(trace: &Trace, expected_order: &[&str]) -> AssertResult {
    let names = trace.step_names();
    if names == expected_order {
        Ok(())
    } else {
        Err(AssertionFailure::new(
            trace,
            format!(
                "Expected exact step order {}, got {}",
                NameList(expected_order.to_vec()),
                NameList(names)
            ),
        ))
    }
}

/// `step_name` never appears after any occurrence of `not_after`.
pub fn step_not_after(trace: &Trace, step_name: &str, not_after: &str) -> AssertResult {
    let mut after_idx = None;
    for (i, step) in trace.iter().enumerate() {
        if step.name == not_after {
            after_idx = Some(i);
        }
        if let (true, Some(after)) = (step.name == step_name, after_idx) {
            return Err(AssertionFailure::new(
                trace,
                format!(
                    "Step '{}' appeared at index {}, after '{}' at index {}.\nSteps: {}",
                    step_name,
                    i,
                    not_after,
                    after,
                    NameList(trace.step_names())
                ),
            )
            .at(step));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

pub fn max_steps(trace: &Trace, maximum: usize) -> AssertResult {
    if trace.len() > maximum {
        return Err(AssertionFailure::new(
            trace,
            format!(
                "Expected at most {} steps, but trace has {} steps.",
                maximum,
                trace.len()
            ),
        ));
    }
    Ok(())
}

pub fn min_steps(trace: &Trace, minimum: usize) -> AssertResult {
    if trace.len() < minimum {
        return Err(AssertionFailure::new(
            trace,
            format!(
                "Expected at least {} steps, but trace has {} steps.",
                minimum,
                trace.len()
            ),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// The named step, or the last step when `step_name` is `None`.
fn target_step<'t>(trace: &'t Trace, step_name: Option<&str>) -> Result<&'t Step, AssertionFailure> {
    match step_name {
        Some(name) => trace.find_step(name).ok_or_else(|| {
            AssertionFailure::new(trace, format!("Step '{}' not found in trace.", name))
        }),
        None => trace
            .steps
            .last()
            .ok_or_else(|| AssertionFailure::new(trace, "Trace has no steps.")),
    }
}

fn output_text(step: &Step) -> String {
    Value::Object(step.output.clone()).to_string()
}

fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(OUTPUT_EXCERPT) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// The step's output, rendered as JSON text, contains `substring`.
pub fn output_contains(trace: &Trace, substring: &str, step_name: Option<&str>) -> AssertResult {
    let step = target_step(trace, step_name)?;
    let text = output_text(step);
    if text.contains(substring) {
        return Ok(());
    }
    Err(AssertionFailure::new(
        trace,
        format!(
            "Expected output of step '{}' to contain '{}'.\nActual output: {}",
            step.name,
            substring,
            excerpt(&text)
        ),
    )
    .at(step))
}

/// The step's output, rendered as JSON text, matches the regex `pattern`.
/// An invalid pattern is reported as a failure.
pub fn output_matches(trace: &Trace, pattern: &str, step_name: Option<&str>) -> AssertResult {
    let step = target_step(trace, step_name)?;
    let re = Regex::new(pattern).map_err(|e| {
        AssertionFailure::new(trace, format!("Invalid pattern '{}': {}", pattern, e))
    })?;
    let text = output_text(step);
    if re.is_match(&text) {
        return Ok(());
    }
    Err(AssertionFailure::new(
        trace,
        format!(
            "Expected output of step '{}' to match pattern '{}'.\nActual output: {}",
            step.name,
            pattern,
            excerpt(&text)
        ),
    )
    .at(step))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

pub fn no_errors(trace: &Trace) -> AssertResult {
    let failed = trace.failed_steps();
    let Some(first) = failed.first() else {
        return Ok(());
    };
    let described: Vec<String> = failed
        .iter()
        .map(|s| format!("{} (error: {})", s.name, s.error.as_deref().unwrap_or("unknown error")))
        .collect();
    Err(AssertionFailure::new(
        trace,
        format!(
            "Expected no errors, but {} step(s) failed: [{}]",
            failed.len(),
            described.join(", ")
        ),
    )
    .at(first))
}

pub fn step_succeeded(trace: &Trace, step_name: &str) -> AssertResult {
    let step = target_step(trace, Some(step_name))?;
    if step.succeeded() {
        return Ok(());
    }
    Err(AssertionFailure::new(
        trace,
        format!(
            "Expected step '{}' to succeed, but it {}.\nError: {}",
            step_name,
            step.status,
            step.error.as_deref().unwrap_or("none")
        ),
    )
    .at(step))
}

pub fn step_failed(trace: &Trace, step_name: &str) -> AssertResult {
    let step = target_step(trace, Some(step_name))?;
    if step.failed() {
        return Ok(());
    }
    Err(AssertionFailure::new(
        trace,
        format!("Expected step '{}' to fail, but it {}.", step_name, step.status),
    )
    .at(step))
}

// ---------------------------------------------------------------------------
// Custom predicates
// ---------------------------------------------------------------------------

/// The first step named `step_name` satisfies `predicate`.
pub fn step_matches(
    trace: &Trace,
    step_name: &str,
    predicate: impl Fn(&Step) -> bool,
    message: Option<&str>,
) -> AssertResult {
    let step = target_step(trace, Some(step_name))?;
    if predicate(step) {
        return Ok(());
    }
    let message = message.map(str::to_string).unwrap_or_else(|| {
        format!("Step '{}' did not match the expected condition.", step_name)
    });
    Err(AssertionFailure::new(trace, message).at(step))
}

pub fn trace_matches(
    trace: &Trace,
    predicate: impl Fn(&Trace) -> bool,
    message: Option<&str>,
) -> AssertResult {
    if predicate(trace) {
        return Ok(());
    }
    Err(AssertionFailure::new(
        trace,
        message.unwrap_or("Trace did not match the expected condition."),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentval_core::payload;
    use serde_json::json;

    #[test]
    fn name_list_renders_quoted() {
        assert_eq!(NameList(vec!["a", "b"]).to_string(), "['a', 'b']");
        assert_eq!(NameList(vec![]).to_string(), "[]");
    }

    #[test]
    fn excerpt_cuts_on_char_boundaries() {
        let long = "é".repeat(OUTPUT_EXCERPT + 10);
        assert_eq!(excerpt(&long).chars().count(), OUTPUT_EXCERPT);
        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn failure_carries_trace_context() {
        let mut trace = Trace::new("ctx");
        trace.add_step(
            Step::new("render", StepType::Custom).with_output(payload(json!({"result": "x"}))),
        );
        let err = output_contains(&trace, "missing", None).unwrap_err();
        assert_eq!(err.trace_name, "ctx");
        assert_eq!(err.trace_id, trace.trace_id);
        assert_eq!(err.step.unwrap().name, "render");
    }
}
