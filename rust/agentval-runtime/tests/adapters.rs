//! Framework adapters: run-result conversion and traced tool dispatch.

use agentval_core::{payload, Step, StepType, Trace};
use agentval_runtime::adapters::{
    Adapter, RunResultAdapter, StubDispatcher, ToolDispatcher, ToolError, ToolRequest,
    TracedDispatcher,
};
use agentval_runtime::{analyze, capture};
use serde_json::json;

fn run_result() -> serde_json::Value {
    json!({
        "raw_responses": [
            {"model": "gpt-4o", "usage": {"input_tokens": 120}},
            {"usage": {"input_tokens": 80}}
        ],
        "new_items": [
            {"type": "tool_call_item", "name": "web_search", "arguments": "{\"q\": \"rust\"}", "output": "3 results"},
            {"type": "reasoning_item", "summary": "thinking"},
            {"type": "handoff_output_item", "source_agent": "triage", "target_agent": "billing"},
            {"type": "message_output_item", "content": "Your invoice is attached."}
        ],
        "final_output": "Your invoice is attached."
    })
}

#[test]
fn run_result_becomes_ordered_trace() {
    let adapter = RunResultAdapter::new("support_run");
    let trace = adapter.parse_trace(&run_result()).unwrap();

    assert_eq!(trace.name, "support_run");
    assert_eq!(
        trace.step_names(),
        vec!["llm_call", "llm_call", "web_search", "handoff_billing", "llm_response"]
    );
    assert_eq!(trace[0].input["model"], json!("gpt-4o"));
    assert_eq!(trace[1].input["model"], json!("unknown"));
    assert_eq!(trace[2].step_type, StepType::ToolCall);
    assert_eq!(trace[2].output["output"], json!("3 results"));
    assert_eq!(trace[3].step_type, StepType::Handoff);
    assert_eq!(trace[3].input["source"], json!("triage"));
    assert_eq!(trace[4].metadata["item_type"], json!("message_output_item"));
    assert_eq!(trace.metadata["adapter"], json!("run_result"));
    assert_eq!(trace.metadata["final_output"], json!("Your invoice is attached."));
    assert!(trace.is_sealed());
}

#[test]
fn long_raw_response_is_truncated() {
    let doc = json!({ "raw_responses": [{"model": "m", "text": "x".repeat(2000)}] });
    let trace = RunResultAdapter::default().from_run_result(&doc);
    assert_eq!(trace.name, "agent_run");
    assert_eq!(trace[0].output["raw"].as_str().unwrap().chars().count(), 500);
}

#[test]
fn failed_tool_item_feeds_analysis() {
    let doc = json!({
        "new_items": [
            {"type": "tool_call_item", "name": "lookup", "output": ""},
            {"type": "tool_call_item", "name": "charge", "error": "card declined"}
        ]
    });
    let trace = RunResultAdapter::default().parse_trace(&doc).unwrap();
    let report = analyze(&trace);
    assert_eq!(report.root_causes.len(), 1);
    assert_eq!(report.root_causes[0].failed_step.name, "charge");
}

#[test]
fn persisted_trace_document_is_parsed_directly() {
    let mut original = Trace::new("persisted");
    original.add_step(
        Step::new("search", StepType::ToolCall).with_output(payload(json!({"result": [1]}))),
    );
    original.seal();

    let parsed = RunResultAdapter::default()
        .parse_trace(&original.to_value().unwrap())
        .unwrap();
    assert_eq!(parsed, original);
}

#[test]
fn live_capture_through_adapter() {
    let adapter = RunResultAdapter::new("live").with_adapter_id("custom_sdk");
    let (trace, answer) = adapter.capture_run(|handle| {
        capture::record("route", StepType::Decision);
        assert_eq!(handle.len(), 1);
        42
    });
    assert_eq!(answer, 42);
    assert_eq!(trace.metadata["adapter"], json!("custom_sdk"));
    assert_eq!(trace.step_names(), vec!["route"]);
}

#[test]
fn traced_dispatcher_records_on_thread_stack() {
    let mut stub = StubDispatcher::new();
    stub.set_response("weather", json!({"temp_c": 21}));
    stub.set_error("flights", ToolError::RateLimit("flights".into()));
    let dispatcher = TracedDispatcher::new(stub);

    let (trace, _) = capture::capture_run("travel", |_| {
        let weather = dispatcher.dispatch(&ToolRequest::new("weather", json!({"city": "Rome"})));
        let flights = dispatcher.dispatch(&ToolRequest::new("flights", json!(["FCO", "JFK"])));
        (weather, flights)
    });

    assert_eq!(trace.step_names(), vec!["weather", "flights"]);
    assert_eq!(trace[0].output["result"], json!({"temp_c": 21}));
    assert_eq!(trace[1].input["args"], json!(["FCO", "JFK"]));
    assert_eq!(
        trace[1].error.as_deref(),
        Some("rate limit exceeded for tool: flights")
    );

    let outside = dispatcher.dispatch(&ToolRequest::new("weather", json!({})));
    assert!(outside.is_ok());
    assert!(!capture::is_capturing());
}
