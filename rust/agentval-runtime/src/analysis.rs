//! Root-cause analysis for failed traces.
//!
//! When step 8 fails, the interesting question is usually which earlier step
//! set it up to fail. Step payloads have no declared schema, so true data-flow
//! tracing is out of reach; instead the analysis walks backwards from each
//! failure collecting earlier steps that either failed themselves or produced
//! an empty result, plus the failed step's parent if that failed too. The
//! earliest piece of evidence is reported as the root cause.
//!
//! Alongside failures the analysis emits warnings for behaviour that is not
//! an error but usually means something is off: the same tool called over and
//! over, or a run that took far more steps than expected.

use agentval_core::hasher::fingerprint;
use agentval_core::{Payload, Step, StepType, Trace};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use tracing::debug;

// ===========================================================================
// Options
// ===========================================================================

/// Thresholds for the warning heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Warn when a trace has more steps than this.
    pub max_steps: usize,
    /// Warn when a tool is called this many times in a row.
    pub loop_threshold: usize,
    /// Warn about individual steps slower than this, if set.
    pub slow_step_ms: Option<f64>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            max_steps: 20,
            loop_threshold: 3,
            slow_step_ms: None,
        }
    }
}

// ===========================================================================
// Report types
// ===========================================================================

/// One piece of evidence in a causal chain.
#[derive(Debug, Clone, PartialEq)]
pub struct CausalLink<'t> {
    pub step_index: usize,
    pub step: &'t Step,
    pub reason: String,
}

/// Why one failed step failed, as far as the trace can tell.
#[derive(Debug, Clone, PartialEq)]
pub struct RootCauseReport<'t> {
    pub failed_step_index: usize,
    pub failed_step: &'t Step,
    pub root_cause_index: usize,
    pub root_cause_step: &'t Step,
    /// Evidence ordered from the root cause to the failure itself.
    pub causal_chain: Vec<CausalLink<'t>>,
    pub summary: String,
}

/// Full analysis of one trace.
#[derive(Debug, Clone)]
pub struct AnalysisReport<'t> {
    pub trace: &'t Trace,
    /// One entry per failed step, in trace order.
    pub root_causes: Vec<RootCauseReport<'t>>,
    pub warnings: Vec<String>,
}

impl<'t> AnalysisReport<'t> {
    pub fn has_failures(&self) -> bool {
        !self.root_causes.is_empty()
    }

    /// Structured rendering for machine consumers.
    pub fn to_json(&self) -> Value {
        json!({
            "trace_id": self.trace.trace_id,
            "name": self.trace.name,
            "steps": self.trace.len(),
            "fingerprint": fingerprint(self.trace),
            "has_failures": self.has_failures(),
            "root_causes": self.root_causes.iter().map(RootCauseReport::to_json).collect::<Vec<_>>(),
            "warnings": self.warnings,
        })
    }
}

impl<'t> RootCauseReport<'t> {
    pub fn to_json(&self) -> Value {
        json!({
            "failed_step_index": self.failed_step_index,
            "failed_step": self.failed_step.name,
            "failed_step_id": self.failed_step.step_id,
            "root_cause_index": self.root_cause_index,
            "root_cause_step": self.root_cause_step.name,
            "root_cause_step_id": self.root_cause_step.step_id,
            "summary": self.summary,
            "causal_chain": self.causal_chain.iter().map(|link| json!({
                "step_index": link.step_index,
                "step": link.step.name,
                "step_id": link.step.step_id,
                "reason": link.reason,
            })).collect::<Vec<_>>(),
        })
    }
}

impl fmt::Display for RootCauseReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary)?;
        writeln!(f)?;
        writeln!(
            f,
            "  Failed: step {} ({})",
            self.failed_step_index, self.failed_step.name
        )?;
        write!(
            f,
            "  Root cause: step {} ({})",
            self.root_cause_index, self.root_cause_step.name
        )?;
        if !self.causal_chain.is_empty() {
            writeln!(f)?;
            writeln!(f)?;
            write!(f, "  Causal chain:")?;
            for link in &self.causal_chain {
                write!(f, "\n    [{}] {}: {}", link.step_index, link.step.name, link.reason)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for AnalysisReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trace analysis: {}", self.trace.label())?;
        writeln!(
            f,
            "Steps: {} | Failures: {}",
            self.trace.len(),
            self.root_causes.len()
        )?;
        write!(f, "{}", "-".repeat(60))?;

        if self.root_causes.is_empty() {
            write!(f, "\nNo failures detected.")?;
        } else {
            for (i, rc) in self.root_causes.iter().enumerate() {
                write!(f, "\n\nFailure #{}:\n{}", i + 1, rc)?;
            }
        }

        if !self.warnings.is_empty() {
            write!(f, "\n\nWarnings:")?;
            for warning in &self.warnings {
                write!(f, "\n  - {}", warning)?;
            }
        }
        Ok(())
    }
}

// ===========================================================================
// Analysis
// ===========================================================================

/// Analyze a sealed trace with default thresholds.
pub fn analyze(trace: &Trace) -> AnalysisReport<'_> {
    analyze_with(trace, &AnalysisOptions::default())
}

pub fn analyze_with<'t>(trace: &'t Trace, options: &AnalysisOptions) -> AnalysisReport<'t> {
    let root_causes: Vec<RootCauseReport<'t>> = trace
        .steps
        .iter()
        .enumerate()
        .filter(|(_, step)| step.failed())
        .filter_map(|(i, _)| analyze_root_cause(trace, i))
        .collect();

    let mut warnings = detect_loops(trace, options.loop_threshold);
    warnings.extend(detect_high_step_count(trace, options.max_steps));
    if let Some(threshold) = options.slow_step_ms {
        warnings.extend(detect_slow_steps(trace, threshold));
    }

    debug!(
        trace_id = %trace.trace_id,
        failures = root_causes.len(),
        warnings = warnings.len(),
        "analyzed trace"
    );

    AnalysisReport {
        trace,
        root_causes,
        warnings,
    }
}

/// Trace the failure at `failed_index` back to its most plausible origin.
/// Returns `None` when the index is out of range.
pub fn analyze_root_cause(trace: &Trace, failed_index: usize) -> Option<RootCauseReport<'_>> {
    let failed_step = trace.get(failed_index)?;
    let mut chain = find_data_dependency(trace, failed_index);
    let failure = CausalLink {
        step_index: failed_index,
        step: failed_step,
        reason: failed_reason(failed_step),
    };

    let summary = if let Some(root) = chain.first() {
        format!(
            "Step {} ({}) failed. Root cause traced to step {} ({}): {}",
            failed_index, failed_step.name, root.step_index, root.step.name, root.reason
        )
    } else {
        format!(
            "Step {} ({}) failed with no identifiable upstream cause. Error: {}",
            failed_index,
            failed_step.name,
            error_text(failed_step)
        )
    };
    chain.push(failure);

    let (root_cause_index, root_cause_step) = (chain[0].step_index, chain[0].step);
    debug!(
        failed = failed_index,
        root_cause = root_cause_index,
        links = chain.len(),
        "root cause resolved"
    );

    Some(RootCauseReport {
        failed_step_index: failed_index,
        failed_step,
        root_cause_index,
        root_cause_step,
        causal_chain: chain,
        summary,
    })
}

/// Does this output count as "produced nothing"?
///
/// Empty when the payload itself is empty, when `result` is missing or null,
/// or when `result` is an empty string, list or object. Zero and `false` are
/// real results and do not count.
pub fn is_empty_output(output: &Payload) -> bool {
    if output.is_empty() {
        return true;
    }
    match output.get("result") {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Bool(_)) | Some(Value::Number(_)) => false,
    }
}

/// Earlier steps that failed or came back empty, plus a failed parent,
/// ordered earliest first.
fn find_data_dependency(trace: &Trace, failed_index: usize) -> Vec<CausalLink<'_>> {
    let mut chain = Vec::new();

    for i in (0..failed_index).rev() {
        let step = &trace.steps[i];
        if step.failed() {
            chain.push(CausalLink {
                step_index: i,
                step,
                reason: failed_reason(step),
            });
        } else if is_empty_output(&step.output) {
            chain.push(CausalLink {
                step_index: i,
                step,
                reason: "Produced empty output (possible upstream data issue)".to_string(),
            });
        }
    }

    if let Some(parent_id) = trace.steps[failed_index].parent_id.as_deref() {
        for (i, step) in trace.steps.iter().enumerate() {
            if step.step_id == parent_id && step.failed() {
                chain.push(CausalLink {
                    step_index: i,
                    step,
                    reason: format!("Parent step failed: {}", error_text(step)),
                });
            }
        }
    }

    chain.sort_by_key(|link| link.step_index);
    chain
}

fn failed_reason(step: &Step) -> String {
    format!("Failed with error: {}", error_text(step))
}

fn error_text(step: &Step) -> &str {
    step.error.as_deref().unwrap_or("unknown error")
}

// ===========================================================================
// Warnings
// ===========================================================================

/// One warning per tool whose longest run of back-to-back calls reaches
/// `threshold`. Only tool calls count; other step types neither extend nor
/// break a run.
fn detect_loops(trace: &Trace, threshold: usize) -> Vec<String> {
    let mut longest: Vec<(&str, usize)> = Vec::new();
    let mut current: Option<(&str, usize)> = None;

    for step in trace.iter().filter(|s| s.step_type == StepType::ToolCall) {
        let run = match current {
            Some((name, count)) if name == step.name => count + 1,
            _ => 1,
        };
        current = Some((step.name.as_str(), run));
        match longest.iter_mut().find(|(name, _)| *name == step.name) {
            Some(entry) => entry.1 = entry.1.max(run),
            None => longest.push((step.name.as_str(), run)),
        }
    }

    longest
        .into_iter()
        .filter(|(_, count)| *count >= threshold.max(1))
        .map(|(name, count)| {
            format!(
                "Tool '{}' was called {} times consecutively (possible loop)",
                name, count
            )
        })
        .collect()
}

fn detect_high_step_count(trace: &Trace, threshold: usize) -> Vec<String> {
    if trace.len() > threshold {
        vec![format!(
            "Trace has {} steps (threshold: {}). Consider if the agent is being efficient.",
            trace.len(),
            threshold
        )]
    } else {
        Vec::new()
    }
}

fn detect_slow_steps(trace: &Trace, threshold_ms: f64) -> Vec<String> {
    trace
        .iter()
        .enumerate()
        .filter(|(_, step)| step.duration_ms > threshold_ms)
        .map(|(i, step)| {
            format!(
                "Step {} ({}) took {:.1}ms (threshold: {:.1}ms)",
                i, step.name, step.duration_ms, threshold_ms
            )
        })
        .collect()
}
