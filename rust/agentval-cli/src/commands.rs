//! Subcommand implementations. Each returns the text to print so the binary
//! only handles argument parsing, output and exit codes.

use crate::colors::{bold, cyan, gray, red, status_label, step_status, yellow};
use crate::config::{AgentvalConfig, ConfigError, CONFIG_FILE};
use agentval_core::{Trace, TraceError};
use agentval_runtime::adapters::{Adapter, RunResultAdapter};
use agentval_runtime::{analyze_with, AnalysisOptions, AnalysisReport};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{} already exists, not overwriting", path.display())]
    AlreadyExists { path: PathBuf },
    #[error("writing '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Threshold overrides given on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub max_steps: Option<usize>,
    pub loop_threshold: Option<usize>,
}

/// Read a trace file. Accepts the persisted trace format and agent-SDK run
/// results.
pub fn load_trace(path: &Path) -> Result<Trace, CliError> {
    let content = std::fs::read_to_string(path).map_err(|source| TraceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: serde_json::Value = serde_json::from_str(&content).map_err(TraceError::from)?;
    let trace = RunResultAdapter::default().parse_trace(&raw)?;
    debug!(path = %path.display(), steps = trace.len(), "loaded trace");
    Ok(trace)
}

/// Analysis thresholds: the config file (explicit path, or discovered from
/// the working directory), then command-line overrides on top.
pub fn resolve_options(
    config_path: Option<&Path>,
    overrides: Overrides,
) -> Result<AnalysisOptions, CliError> {
    let config = match config_path {
        Some(path) => AgentvalConfig::load_from(path)?,
        None => AgentvalConfig::load()?,
    };
    let mut options = config.analysis;
    if let Some(max_steps) = overrides.max_steps {
        options.max_steps = max_steps;
    }
    if let Some(loop_threshold) = overrides.loop_threshold {
        options.loop_threshold = loop_threshold;
    }
    Ok(options)
}

/// One line per step: index, status, type, name, duration, error.
pub fn render_show(trace: &Trace) -> String {
    let duration = match trace.duration_ms() {
        Some(ms) => format!("{:.1}ms", ms),
        None => "unsealed".to_string(),
    };
    let mut out = format!(
        "{} {} {}\n",
        status_label("Trace"),
        cyan(trace.label()),
        gray(&format!("({} steps, {}, id {})", trace.len(), duration, trace.trace_id))
    );
    for (i, step) in trace.iter().enumerate() {
        out.push_str(&format!(
            "{:>4}  {}  {:<10}  {}  {}",
            i,
            step_status(step.status),
            step.step_type.as_str(),
            bold(&step.name),
            gray(&format!("{:.1}ms", step.duration_ms))
        ));
        if let Some(error) = &step.error {
            out.push_str(&format!("  {} {}", red("error:"), error));
        }
        out.push('\n');
    }
    out
}

/// Human report, or the structured JSON rendering.
pub fn render_analysis(report: &AnalysisReport<'_>, json: bool) -> Result<String, CliError> {
    if json {
        let rendered = serde_json::to_string_pretty(&report.to_json()).map_err(TraceError::from)?;
        return Ok(rendered);
    }
    Ok(report.to_string())
}

/// Result of `agentval check`.
#[derive(Debug)]
pub struct CheckOutcome {
    pub passed: bool,
    pub output: String,
}

pub fn check(trace: &Trace, options: &AnalysisOptions) -> CheckOutcome {
    let report = analyze_with(trace, options);
    info!(
        trace_id = %trace.trace_id,
        failures = report.root_causes.len(),
        "checked trace"
    );
    if report.has_failures() {
        return CheckOutcome {
            passed: false,
            output: format!("{} {}\n\n{}", red("FAIL"), trace.label(), report),
        };
    }
    let mut output = format!("{} {} ({} steps)", status_label("Passed"), trace.label(), trace.len());
    for warning in &report.warnings {
        output.push_str(&format!("\n{} {}", yellow("warning:"), warning));
    }
    CheckOutcome {
        passed: true,
        output,
    }
}

/// Write the default config template into `dir`.
pub fn init(dir: &Path) -> Result<PathBuf, CliError> {
    let path = dir.join(CONFIG_FILE);
    if path.exists() {
        return Err(CliError::AlreadyExists { path });
    }
    std::fs::write(&path, AgentvalConfig::default_template()).map_err(|source| {
        CliError::Write {
            path: path.clone(),
            source,
        }
    })?;
    Ok(path)
}
