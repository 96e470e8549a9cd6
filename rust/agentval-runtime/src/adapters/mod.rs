//! Framework adapters.
//!
//! An adapter turns a third-party agent runtime's execution into a
//! [`Trace`]: either live, by capturing while the run happens, or after the
//! fact, by converting whatever record the framework left behind.

mod dispatch;
mod run_result;

pub use dispatch::{StubDispatcher, ToolDispatcher, ToolError, ToolRequest, ToolResponse, TracedDispatcher};
pub use run_result::RunResultAdapter;

use crate::capture::TraceHandle;
use agentval_core::{Result, Trace};
use serde_json::Value;

pub trait Adapter {
    /// Capture a live run. Steps recorded while `body` runs land in the
    /// returned trace.
    fn capture_run<R>(&self, body: impl FnOnce(&TraceHandle) -> R) -> (Trace, R);

    /// Convert an already-completed run's data into a trace. Items the
    /// adapter does not recognize are skipped rather than rejected.
    fn parse_trace(&self, raw: &Value) -> Result<Trace>;
}
