//! agentval core
//!
//! The trace and step data model shared by capture, analysis and assertions:
//! an append-only, ordered record of what an agent workflow actually did.

pub mod error;
pub mod hasher;
pub mod persist;
pub mod step;
pub mod trace;

pub use error::{Result, TraceError};
pub use step::{new_step_id, new_trace_id, now_timestamp, Payload, Step, StepStatus, StepType};
pub use trace::Trace;

/// Build a [`Payload`] from a `serde_json::json!` object literal. Anything
/// other than an object yields an empty payload.
pub fn payload(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Payload::new(),
    }
}
