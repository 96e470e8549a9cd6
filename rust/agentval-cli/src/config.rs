//! Configuration file parsing for `agentval.toml`.
//!
//! Searches the current directory then its ancestors. With no file found,
//! analysis runs with default thresholds.

use agentval_runtime::AnalysisOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const CONFIG_FILE: &str = "agentval.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid toml in '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct AgentvalConfig {
    #[serde(default)]
    pub analysis: AnalysisOptions,
}

impl AgentvalConfig {
    /// Load config from `agentval.toml`, searching current dir then parents.
    /// Returns `Default` when no file is found.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self::load_with_path()?
            .map(|(_path, cfg)| cfg)
            .unwrap_or_default())
    }

    /// Load config and return the path to the config file that was found.
    pub fn load_with_path() -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let Ok(cwd) = std::env::current_dir() else {
            return Ok(None);
        };
        Self::find_from(&cwd)
    }

    /// Search `start` and each of its ancestors for a config file.
    pub fn find_from(start: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        for dir in start.ancestors() {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.is_file() {
                let cfg = Self::load_from(&config_path)?;
                debug!(path = %config_path.display(), "loaded config");
                return Ok(Some((config_path, cfg)));
            }
        }
        Ok(None)
    }

    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a TOML string directly.
    pub fn parse(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Generate a default `agentval.toml` template.
    pub fn default_template() -> &'static str {
        r#"# agentval configuration

# Thresholds for the warnings reported by `agentval analyze`
[analysis]
# Warn when a trace has more steps than this
max_steps = 20
# Warn when the same tool is called this many times in a row
loop_threshold = 3
# Warn about individual steps slower than this many milliseconds
# slow_step_ms = 5000.0
"#
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
