//! JSON persistence for traces.
//!
//! The document layout is the `Trace`/`Step` serde shape: one object with
//! `trace_id`, `name`, `start_time`, `end_time`, `metadata` and an ordered
//! `steps` array. Unknown keys inside `input`, `output` and `metadata` are
//! carried through untouched.

use crate::error::{Result, TraceError};
use crate::trace::Trace;
use serde_json::Value;
use std::fs;
use std::path::Path;

impl Trace {
    /// Pretty-printed JSON (two-space indent).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_json_compact(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{Step, StepType};
    use serde_json::json;

    #[test]
    fn end_time_and_nullables_are_written_explicitly() {
        let trace = Trace::new("open");
        let mut with_step = trace.clone();
        with_step.add_step(Step::new("s", StepType::Custom));
        let value = with_step.to_value().unwrap();
        assert_eq!(value["end_time"], Value::Null);
        assert_eq!(value["steps"][0]["error"], Value::Null);
        assert_eq!(value["steps"][0]["parent_id"], Value::Null);
        assert_eq!(value["steps"][0]["step_type"], json!("custom"));
    }

    #[test]
    fn unknown_step_type_rejects_whole_document() {
        let doc = json!({
            "trace_id": "abc",
            "name": "bad",
            "start_time": 1.0,
            "end_time": null,
            "metadata": {},
            "steps": [
                {"name": "ok", "step_type": "tool_call"},
                {"name": "broken", "step_type": "teleport"}
            ]
        });
        let err = Trace::from_value(doc).unwrap_err();
        assert!(matches!(err, TraceError::Json(_)));
        assert!(err.to_string().starts_with("malformed trace"));
    }

    #[test]
    fn load_missing_file_reports_path() {
        let path = std::env::temp_dir().join(format!("agentval-missing-{}.json", uuid::Uuid::new_v4()));
        let err = Trace::load(&path).unwrap_err();
        match err {
            TraceError::Io { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected io error, got {other}"),
        }
    }
}
