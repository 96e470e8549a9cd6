//! Live trace capture.
//!
//! A [`TraceStack`] holds the traces that are currently being recorded, last
//! opened on top. Opening a capture scope pushes a fresh [`Trace`]; steps go
//! to whichever trace is on top; closing the scope seals and pops it. Scopes
//! nest: a sub-workflow can be captured independently inside an enclosing
//! capture, and its steps never leak into the outer trace.
//!
//! Each thread owns one stack, used by the free functions in this module
//! ([`capture`], [`record_step`], [`current_trace`], the instrumentation
//! wrappers). Code that wants explicit control can create its own
//! [`TraceStack`] and thread it through instead.
//!
//! ```rust
//! use agentval_core::{Step, StepType};
//! use agentval_runtime::capture;
//!
//! let scope = capture::capture("my_agent_run");
//! capture::record_step(Step::new("plan", StepType::Decision));
//! let trace = scope.finish();
//! assert_eq!(trace.step_names(), vec!["plan"]);
//! assert!(trace.end_time.is_some());
//! ```

mod instrument;

pub use instrument::{callable_name, encode_args, instrument, instrument_llm, instrument_tool};

use agentval_core::{Payload, Step, StepType, Trace};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

// ===========================================================================
// TraceHandle
// ===========================================================================

/// Shared handle to a trace that may still be recording.
///
/// Handles are cheap to clone. Reading through a handle (via [`with`] or
/// [`snapshot`]) while a step is being appended through another clone of the
/// same handle is not supported.
///
/// [`with`]: TraceHandle::with
/// [`snapshot`]: TraceHandle::snapshot
#[derive(Debug, Clone)]
pub struct TraceHandle {
    inner: Rc<RefCell<Trace>>,
}

impl TraceHandle {
    fn new(trace: Trace) -> Self {
        Self {
            inner: Rc::new(RefCell::new(trace)),
        }
    }

    /// Run `f` against the current contents of the trace.
    pub fn with<R>(&self, f: impl FnOnce(&Trace) -> R) -> R {
        f(&self.inner.borrow())
    }

    /// Copy of the trace as it stands now.
    pub fn snapshot(&self) -> Trace {
        self.inner.borrow().clone()
    }

    /// Take the trace out of the handle, cloning only if other handles to
    /// it are still alive.
    pub fn into_trace(self) -> Trace {
        match Rc::try_unwrap(self.inner) {
            Ok(cell) => cell.into_inner(),
            Err(shared) => shared.borrow().clone(),
        }
    }

    pub fn trace_id(&self) -> String {
        self.inner.borrow().trace_id.clone()
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.borrow().is_sealed()
    }

    /// Append `step` and return a copy of what was stored.
    pub fn record(&self, step: Step) -> Step {
        let stored = step.clone();
        let mut trace = self.inner.borrow_mut();
        debug!(
            trace_id = %trace.trace_id,
            step = %step.name,
            step_type = %step.step_type,
            status = %step.status,
            "recorded step"
        );
        trace.add_step(step);
        stored
    }

    fn seal(&self) {
        self.inner.borrow_mut().seal();
    }

    fn same_trace(&self, other: &TraceHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

// ===========================================================================
// TraceStack
// ===========================================================================

/// Last-in-first-out stack of active traces for one thread of control.
///
/// Cloning yields another handle to the same stack. The stack is not `Send`;
/// concurrent executions each need their own.
#[derive(Debug, Clone, Default)]
pub struct TraceStack {
    active: Rc<RefCell<Vec<TraceHandle>>>,
}

impl TraceStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a capture scope: push a new trace and return the guard that
    /// will seal and pop it.
    pub fn open(&self, name: impl Into<String>, metadata: Payload) -> CaptureScope {
        let trace = TraceHandle::new(Trace::new(name).with_metadata(metadata));
        self.active.borrow_mut().push(trace.clone());
        debug!(
            trace_id = %trace.trace_id(),
            name = %trace.name(),
            depth = self.depth(),
            "opened capture scope"
        );
        CaptureScope {
            stack: self.clone(),
            trace,
            closed: false,
        }
    }

    /// The innermost active trace, if any.
    pub fn current(&self) -> Option<TraceHandle> {
        self.active.borrow().last().cloned()
    }

    pub fn depth(&self) -> usize {
        self.active.borrow().len()
    }

    pub fn is_capturing(&self) -> bool {
        !self.active.borrow().is_empty()
    }

    /// Append `step` to the innermost active trace. Returns `None`, and
    /// records nothing, when no trace is active.
    pub fn record_step(&self, step: Step) -> Option<Step> {
        self.current().map(|trace| trace.record(step))
    }

    /// Record a bare step with default payloads and success status.
    pub fn record(&self, name: impl Into<String>, step_type: StepType) -> Option<Step> {
        self.record_step(Step::new(name, step_type))
    }

    /// Run `body` inside a capture scope and return the sealed trace along
    /// with the body's result.
    pub fn capture_run<R>(
        &self,
        name: impl Into<String>,
        body: impl FnOnce(&TraceHandle) -> R,
    ) -> (Trace, R) {
        let scope = self.open(name, Payload::new());
        let result = body(&scope.trace);
        (scope.finish(), result)
    }

    /// Remove exactly `trace` from the stack, wherever it sits.
    fn remove(&self, trace: &TraceHandle) {
        let mut active = self.active.borrow_mut();
        match active.iter().rposition(|t| t.same_trace(trace)) {
            Some(pos) if pos + 1 == active.len() => {
                active.pop();
            }
            Some(pos) => {
                warn!(
                    trace_id = %trace.trace_id(),
                    above = active.len() - pos - 1,
                    "capture scope closed out of order"
                );
                active.remove(pos);
            }
            None => {}
        }
    }
}

thread_local! {
    static LOCAL_STACK: TraceStack = TraceStack::new();
}

/// The calling thread's trace stack.
pub fn local_stack() -> TraceStack {
    LOCAL_STACK.with(TraceStack::clone)
}

// ===========================================================================
// CaptureScope
// ===========================================================================

/// Guard for an open capture. The trace it pushed is sealed and popped when
/// the guard is finished or dropped, including during a panic unwind or an
/// early `?` return.
#[must_use = "dropping the scope closes the capture immediately"]
#[derive(Debug)]
pub struct CaptureScope {
    stack: TraceStack,
    trace: TraceHandle,
    closed: bool,
}

impl CaptureScope {
    /// Handle to the trace being recorded. Stays valid after the scope
    /// closes, so a caller can still read the sealed trace after a failure.
    pub fn trace(&self) -> TraceHandle {
        self.trace.clone()
    }

    /// Close the scope and return the sealed trace.
    pub fn finish(mut self) -> Trace {
        self.close();
        self.trace.snapshot()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stack.remove(&self.trace);
        self.trace.seal();
        debug!(
            trace_id = %self.trace.trace_id(),
            steps = self.trace.len(),
            panicking = std::thread::panicking(),
            "closed capture scope"
        );
    }
}

impl Drop for CaptureScope {
    fn drop(&mut self) {
        self.close();
    }
}

// ===========================================================================
// Thread-local API
// ===========================================================================

/// Open a capture scope on this thread's stack.
pub fn capture(name: impl Into<String>) -> CaptureScope {
    local_stack().open(name, Payload::new())
}

pub fn capture_with(name: impl Into<String>, metadata: Payload) -> CaptureScope {
    local_stack().open(name, metadata)
}

/// Closure form of [`capture`].
pub fn capture_run<R>(name: impl Into<String>, body: impl FnOnce(&TraceHandle) -> R) -> (Trace, R) {
    local_stack().capture_run(name, body)
}

/// This thread's innermost active trace, if any.
pub fn current_trace() -> Option<TraceHandle> {
    local_stack().current()
}

pub fn is_capturing() -> bool {
    local_stack().is_capturing()
}

/// Append `step` to this thread's innermost active trace. A no-op returning
/// `None` outside any capture scope.
pub fn record_step(step: Step) -> Option<Step> {
    local_stack().record_step(step)
}

pub fn record(name: impl Into<String>, step_type: StepType) -> Option<Step> {
    local_stack().record(name, step_type)
}
