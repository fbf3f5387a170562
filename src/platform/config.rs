//! `scenarist.toml` loading and the layered runtime configuration store.
//!
//! Precedence, highest first: value set from code, command line, config
//! file, built-in default.

use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{ScenaristError, ScenaristResult};

/// Well-known configuration keys.
pub mod keys {
    pub const ISSUE_LEVEL_ERROR: &str = "issue_level_error";
    pub const ISSUE_LEVEL_IGNORED: &str = "issue_level_ignored";
    pub const CONTINUE_ON_ERROR: &str = "continue_on_error";
    pub const DELAY_BETWEEN_STEPS_MS: &str = "delay_between_steps_ms";
    pub const DOC_ONLY: &str = "doc_only";
    pub const RESULTS_DIR: &str = "results_dir";
}

/// A configuration value, as found in any layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl ConfigValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::Int(n) => Some(*n != 0),
            ConfigValue::Str(s) => match s.as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(n) => Some(*n),
            ConfigValue::Str(s) => s.parse().ok(),
            ConfigValue::Bool(_) => None,
        }
    }

    pub fn as_str(&self) -> String {
        match self {
            ConfigValue::Str(s) => s.clone(),
            ConfigValue::Int(n) => n.to_string(),
            ConfigValue::Bool(b) => b.to_string(),
        }
    }
}

/// `scenarist.toml` contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    /// Known issues at or above this level count as errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_level_error: Option<i64>,

    /// Known issues below this level are dropped entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_level_ignored: Option<i64>,

    /// Keep executing steps after a failure.
    #[serde(default)]
    pub continue_on_error: bool,

    /// Pause between steps, in milliseconds.
    #[serde(default)]
    pub delay_between_steps_ms: u64,

    /// Directory for reports written without an explicit path.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Named issue levels, e.g. `SUT = 30`.
    #[serde(default)]
    pub issue_levels: BTreeMap<String, i64>,
}

fn default_results_dir() -> PathBuf {
    PathBuf::from(".scenarist")
}

impl FileConfig {
    /// Missing files are treated as "defaults"; unreadable files warn and
    /// fall back rather than abort.
    pub fn load_optional(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => match toml::from_str::<FileConfig>(&s) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!("failed to parse config {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!("failed to read config {}: {err}", path.display());
                Self::default()
            }
        }
    }

    fn lookup(&self, key: &str) -> Option<ConfigValue> {
        match key {
            keys::ISSUE_LEVEL_ERROR => self.issue_level_error.map(ConfigValue::Int),
            keys::ISSUE_LEVEL_IGNORED => self.issue_level_ignored.map(ConfigValue::Int),
            keys::CONTINUE_ON_ERROR => Some(ConfigValue::Bool(self.continue_on_error)),
            keys::DELAY_BETWEEN_STEPS_MS => {
                Some(ConfigValue::Int(self.delay_between_steps_ms as i64))
            }
            keys::RESULTS_DIR => Some(ConfigValue::Str(
                self.results_dir.to_string_lossy().to_string(),
            )),
            _ => None,
        }
    }
}

/// Runtime configuration store, owned by one run context at a time.
#[derive(Debug, Clone, Default)]
pub struct ScenarioConfig {
    file: FileConfig,
    cli: BTreeMap<String, ConfigValue>,
    code: BTreeMap<String, ConfigValue>,
}

impl ScenarioConfig {
    pub fn new(file: FileConfig) -> Self {
        Self {
            file,
            cli: BTreeMap::new(),
            code: BTreeMap::new(),
        }
    }

    pub fn file(&self) -> &FileConfig {
        &self.file
    }

    /// Set a value from the command-line layer.
    pub fn set_cli(&mut self, key: &str, value: ConfigValue) {
        self.cli.insert(key.to_string(), value);
    }

    /// Set a value from code; wins over every other layer.
    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.code.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        self.code
            .get(key)
            .or_else(|| self.cli.get(key))
            .cloned()
            .or_else(|| self.file.lookup(key))
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_int())
    }

    // Typed accessors for the keys the engine reads.

    pub fn issue_level_error(&self) -> Option<i64> {
        self.get_int(keys::ISSUE_LEVEL_ERROR)
    }

    pub fn issue_level_ignored(&self) -> Option<i64> {
        self.get_int(keys::ISSUE_LEVEL_IGNORED)
    }

    pub fn continue_on_error(&self) -> bool {
        self.get_bool(keys::CONTINUE_ON_ERROR, false)
    }

    pub fn doc_only(&self) -> bool {
        self.get_bool(keys::DOC_ONLY, false)
    }

    pub fn delay_between_steps(&self) -> Duration {
        Duration::from_millis(
            self.get_int(keys::DELAY_BETWEEN_STEPS_MS)
                .and_then(|n| u64::try_from(n).ok())
                .unwrap_or(0),
        )
    }

    pub fn results_dir(&self) -> PathBuf {
        self.get(keys::RESULTS_DIR)
            .map(|v| PathBuf::from(v.as_str()))
            .unwrap_or_else(default_results_dir)
    }

    /// Resolve a named or numeric issue level against the configured name
    /// table.
    pub fn parse_issue_level(&self, raw: &str) -> ScenaristResult<i64> {
        if let Some(level) = self.file.issue_levels.get(raw) {
            return Ok(*level);
        }
        raw.parse().map_err(|_| {
            ScenaristError::InvalidArgument(format!(
                "unknown issue level {raw:?} (named levels: {})",
                self.file
                    .issue_levels
                    .iter()
                    .map(|(name, level)| format!("{name}={level}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }
}
