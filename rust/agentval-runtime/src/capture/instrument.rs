//! Wrap callables so each invocation is recorded as a step.
//!
//! The wrapper has the same signature as the wrapped function and returns
//! the same `Ok`/`Err`, or panics with the same payload. With no active
//! trace it calls straight through and records nothing.

use super::{current_trace, TraceHandle, TraceStack};
use crate::panic_boundary::catch_panic;
use agentval_core::{Payload, Step, StepStatus, StepType};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::warn;

/// Step name used when the callable's type carries no name.
const ANONYMOUS_CALLABLE: &str = "callable";

/// Wrap `f` so calls inside a capture scope are recorded as `step_type`
/// steps named `name` (or the callable's own name when `None`).
///
/// Calls resolve the active trace of the calling thread at call time.
pub fn instrument<A, T, E, F>(
    step_type: StepType,
    name: Option<&str>,
    f: F,
) -> impl Fn(A) -> Result<T, E>
where
    A: Serialize,
    T: Serialize,
    E: Display,
    F: Fn(A) -> Result<T, E>,
{
    let name = name.map(str::to_string).unwrap_or_else(callable_name::<F>);
    move |args: A| invoke(current_trace(), step_type, &name, &f, args)
}

/// [`instrument`] as a `tool_call`.
pub fn instrument_tool<A, T, E, F>(name: Option<&str>, f: F) -> impl Fn(A) -> Result<T, E>
where
    A: Serialize,
    T: Serialize,
    E: Display,
    F: Fn(A) -> Result<T, E>,
{
    instrument(StepType::ToolCall, name, f)
}

/// [`instrument`] as an `llm_call`.
pub fn instrument_llm<A, T, E, F>(name: Option<&str>, f: F) -> impl Fn(A) -> Result<T, E>
where
    A: Serialize,
    T: Serialize,
    E: Display,
    F: Fn(A) -> Result<T, E>,
{
    instrument(StepType::LlmCall, name, f)
}

impl TraceStack {
    /// [`instrument`] against this stack instead of the thread's own.
    pub fn instrument<A, T, E, F>(
        &self,
        step_type: StepType,
        name: Option<&str>,
        f: F,
    ) -> impl Fn(A) -> Result<T, E>
    where
        A: Serialize,
        T: Serialize,
        E: Display,
        F: Fn(A) -> Result<T, E>,
    {
        let stack = self.clone();
        let name = name.map(str::to_string).unwrap_or_else(callable_name::<F>);
        move |args: A| invoke(stack.current(), step_type, &name, &f, args)
    }
}

fn invoke<A, T, E, F>(
    trace: Option<TraceHandle>,
    step_type: StepType,
    name: &str,
    f: &F,
    args: A,
) -> Result<T, E>
where
    A: Serialize,
    T: Serialize,
    E: Display,
    F: Fn(A) -> Result<T, E>,
{
    let Some(trace) = trace else {
        return f(args);
    };

    let mut step = Step::new(name, step_type).with_input(encode_args(&args));
    let started = Instant::now();
    let outcome = catch_panic(AssertUnwindSafe(|| f(args)));
    step.duration_ms = started.elapsed().as_secs_f64() * 1000.0;

    match outcome {
        Ok(Ok(value)) => {
            let result = match serde_json::to_value(&value) {
                Ok(encoded) => encoded,
                Err(e) => {
                    warn!(step = %name, error = %e, "could not encode step output");
                    step.metadata
                        .insert("output_encoding_error".to_string(), Value::String(e.to_string()));
                    Value::Null
                }
            };
            step.set_output("result", result);
            step.status = StepStatus::Success;
            trace.record(step);
            Ok(value)
        }
        Ok(Err(err)) => {
            step.status = StepStatus::Failed;
            step.error = Some(err.to_string());
            trace.record(step);
            Err(err)
        }
        Err(caught) => {
            step.status = StepStatus::Failed;
            step.error = Some(caught.error().to_string());
            trace.record(step);
            caught.resume()
        }
    }
}

/// Encode call arguments as a step input.
///
/// Arguments that serialize to an object (a struct or map) go under
/// `"kwargs"`. Everything else goes under `"args"` as a list: tuples and
/// sequences as-is, `()` as an empty list, a lone scalar as a one-element
/// list.
pub fn encode_args<A: Serialize>(args: &A) -> Payload {
    let mut input = Payload::new();
    match serde_json::to_value(args) {
        Ok(Value::Object(map)) => {
            input.insert("kwargs".to_string(), Value::Object(map));
        }
        Ok(Value::Array(items)) => {
            input.insert("args".to_string(), Value::Array(items));
        }
        Ok(Value::Null) => {
            input.insert("args".to_string(), Value::Array(Vec::new()));
        }
        Ok(scalar) => {
            input.insert("args".to_string(), Value::Array(vec![scalar]));
        }
        Err(e) => {
            warn!(error = %e, "could not encode step input");
            input.insert("args".to_string(), Value::Array(Vec::new()));
            input.insert("encoding_error".to_string(), Value::String(e.to_string()));
        }
    }
    input
}

/// Short name of a callable type: the last path segment of its type name,
/// without generic arguments. Closures take the name of the enclosing
/// function. Function pointers, trait objects and references carry no name
/// of their own and yield `"callable"`.
pub fn callable_name<F>() -> String {
    let full = std::any::type_name::<F>();
    if ["fn(", "unsafe fn(", "extern ", "dyn ", "&", "*", "alloc::boxed::Box<dyn "]
        .iter()
        .any(|prefix| full.starts_with(prefix))
    {
        return ANONYMOUS_CALLABLE.to_string();
    }
    let mut base = full.split('<').next().unwrap_or(full);
    while let Some(stripped) = base.strip_suffix("::{{closure}}") {
        base = stripped;
    }
    base.rsplit("::").next().unwrap_or(base).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn double(x: i64) -> Result<i64, String> {
        Ok(x * 2)
    }

    fn bad_tool(_: ()) -> Result<(), String> {
        Err("boom".to_string())
    }

    #[derive(Serialize)]
    struct Query {
        q: String,
        limit: u32,
    }

    #[test]
    fn records_successful_call() {
        let stack = TraceStack::new();
        let tool = stack.instrument(StepType::ToolCall, None, double);
        let scope = stack.open("test", Payload::new());
        assert_eq!(tool(5), Ok(10));
        let trace = scope.finish();

        assert_eq!(trace.len(), 1);
        let step = &trace[0];
        assert_eq!(step.name, "double");
        assert_eq!(step.step_type, StepType::ToolCall);
        assert_eq!(step.input["args"], json!([5]));
        assert_eq!(step.output["result"], json!(10));
        assert!(step.succeeded());
        assert!(step.duration_ms >= 0.0);
    }

    #[test]
    fn override_name_wins() {
        let stack = TraceStack::new();
        let search = stack.instrument(StepType::ToolCall, Some("custom_search"), |q: String| {
            Ok::<_, String>(vec![q])
        });
        let scope = stack.open("test", Payload::new());
        search("hello".to_string()).unwrap();
        assert_eq!(scope.finish()[0].name, "custom_search");
    }

    #[test]
    fn records_failure_and_returns_same_error() {
        let stack = TraceStack::new();
        let tool = stack.instrument(StepType::ToolCall, None, bad_tool);
        let scope = stack.open("test", Payload::new());
        assert_eq!(tool(()), Err("boom".to_string()));
        let trace = scope.finish();

        assert_eq!(trace.len(), 1);
        assert!(trace[0].failed());
        assert_eq!(trace[0].error.as_deref(), Some("boom"));
        assert_eq!(trace[0].input["args"], json!([]));
        assert!(trace[0].output.is_empty());
    }

    #[test]
    fn panic_is_recorded_then_resumed() {
        let stack = TraceStack::new();
        let tool = stack.instrument(StepType::ToolCall, Some("explode"), |_: ()| -> Result<(), String> {
            panic!("kaboom")
        });
        let scope = stack.open("test", Payload::new());
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| tool(())));
        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"kaboom"));

        let trace = scope.finish();
        assert_eq!(trace.len(), 1);
        assert!(trace[0].failed());
        assert_eq!(trace[0].error.as_deref(), Some("panic: kaboom"));
    }

    #[test]
    fn no_active_trace_calls_straight_through() {
        let stack = TraceStack::new();
        let tool = stack.instrument(StepType::ToolCall, None, double);
        assert_eq!(tool(3), Ok(6));
        let failing = stack.instrument(StepType::ToolCall, None, bad_tool);
        assert_eq!(failing(()), Err("boom".to_string()));
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn encode_args_shapes() {
        let kwargs = encode_args(&Query { q: "rust".into(), limit: 3 });
        assert_eq!(kwargs["kwargs"], json!({"q": "rust", "limit": 3}));
        assert_eq!(encode_args(&("a", 1))["args"], json!(["a", 1]));
        assert_eq!(encode_args(&())["args"], json!([]));
        assert_eq!(encode_args(&"solo")["args"], json!(["solo"]));
    }

    #[test]
    fn callable_names() {
        let closure = |x: i32| x;
        fn name_of<F>(_: &F) -> String {
            callable_name::<F>()
        }
        assert_eq!(name_of(&closure), "callable_names");
        assert_eq!(name_of(&double), "double");
    }

    #[test]
    fn function_pointers_get_a_generic_name() {
        let pointer: fn(i64) -> Result<i64, String> = double;
        assert_eq!(callable_name::<fn(i64) -> Result<i64, String>>(), "callable");
        assert_eq!(callable_name::<&dyn Fn(i64) -> i64>(), "callable");

        let stack = TraceStack::new();
        let tool = stack.instrument(StepType::ToolCall, None, pointer);
        let scope = stack.open("test", Payload::new());
        assert_eq!(tool(4), Ok(8));
        assert_eq!(scope.finish()[0].name, "callable");
    }
}
