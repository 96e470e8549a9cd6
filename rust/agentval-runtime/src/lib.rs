//! agentval runtime
//!
//! Records what an agent workflow does while it runs, then explains it
//! afterwards: capture scopes and instrumented calls build a [`Trace`], the
//! analysis engine traces each failure back to its most plausible origin,
//! and the assertion library checks behaviour against expectations.
//!
//! [`Trace`]: agentval_core::Trace

pub mod adapters;
pub mod analysis;
pub mod assertions;
pub mod capture;
pub mod panic_boundary;

pub use analysis::{
    analyze, analyze_root_cause, analyze_with, AnalysisOptions, AnalysisReport, CausalLink,
    RootCauseReport,
};
pub use assertions::{AssertResult, AssertionFailure};
pub use capture::{
    capture, capture_run, capture_with, current_trace, instrument, instrument_llm,
    instrument_tool, is_capturing, record, record_step, CaptureScope, TraceHandle, TraceStack,
};
