//! Configuration for the grep filter.
//!
//! The filter is configured through a flat parameter map, as handed over by
//! the host pipeline: `regexp1`..`regexp20` and `exclude1`..`exclude20` hold
//! `"<field> <pattern>"` strings. Two optional limits share the same map:
//! `max_value_bytes` and `regex_size_limit`. Unrecognized keys are ignored.
//!
//! # Example
//! ```rust
//! use record_grep::config::GrepConfig;
//!
//! let config = GrepConfig::new()
//!     .with_param("regexp1", "message ^ERROR")
//!     .with_param("exclude1", "level ^DEBUG$");
//!
//! assert_eq!(config.regexp(1).unwrap(), Some("message ^ERROR"));
//! assert_eq!(config.exclude(2).unwrap(), None);
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Maximum number of `regexp<i>` slots, and of `exclude<i>` slots.
pub const REGEXP_MAX_NUM: usize = 20;

/// Prefix of the required-pattern slots.
pub const REGEXP_PREFIX: &str = "regexp";

/// Prefix of the exclusion-pattern slots.
pub const EXCLUDE_PREFIX: &str = "exclude";

const MAX_VALUE_BYTES_KEY: &str = "max_value_bytes";
const REGEX_SIZE_LIMIT_KEY: &str = "regex_size_limit";

/// Limits applied while compiling and matching patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchConfig {
    /// Largest field value, in bytes, that may be matched. A longer value
    /// fails the match (and with it the batch). `None` disables the check.
    pub max_value_bytes: Option<usize>,

    /// Compiled program size limit passed to the regex builder. `None`
    /// keeps the regex crate's default.
    pub regex_size_limit: Option<usize>,
}

impl MatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_value_bytes(mut self, bytes: usize) -> Self {
        self.max_value_bytes = Some(bytes);
        self
    }

    pub fn with_regex_size_limit(mut self, bytes: usize) -> Self {
        self.regex_size_limit = Some(bytes);
        self
    }
}

/// Parsed parameter map for one grep filter instance.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct GrepConfig {
    params: BTreeMap<String, serde_yaml::Value>,
}

impl GrepConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a string parameter, replacing any previous value for `key`.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params
            .insert(key.into(), serde_yaml::Value::String(value.into()));
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a parameter map from a `.yaml`, `.yml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            _ => Err(ConfigError::Parse(format!(
                "unsupported configuration file extension: {}",
                path.display()
            ))),
        }
    }

    /// Value of the `regexp<index>` slot, if configured.
    pub fn regexp(&self, index: usize) -> Result<Option<&str>, ConfigError> {
        self.string_param(&slot_name(REGEXP_PREFIX, index))
    }

    /// Value of the `exclude<index>` slot, if configured.
    pub fn exclude(&self, index: usize) -> Result<Option<&str>, ConfigError> {
        self.string_param(&slot_name(EXCLUDE_PREFIX, index))
    }

    /// Match limits carried in the same parameter map.
    pub fn match_config(&self) -> Result<MatchConfig, ConfigError> {
        Ok(MatchConfig {
            max_value_bytes: self.usize_param(MAX_VALUE_BYTES_KEY)?,
            regex_size_limit: self.usize_param(REGEX_SIZE_LIMIT_KEY)?,
        })
    }

    /// A null value counts as unset, matching an omitted key.
    pub fn string_param(&self, key: &str) -> Result<Option<&str>, ConfigError> {
        match self.params.get(key) {
            None | Some(serde_yaml::Value::Null) => Ok(None),
            Some(serde_yaml::Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ConfigError::InvalidParameter {
                param: key.to_string(),
                message: format!("expected a string, found {}", type_name(other)),
            }),
        }
    }

    fn usize_param(&self, key: &str) -> Result<Option<usize>, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidParameter {
            param: key.to_string(),
            message,
        };

        match self.params.get(key) {
            None | Some(serde_yaml::Value::Null) => Ok(None),
            Some(serde_yaml::Value::Number(n)) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| invalid(format!("expected a non-negative integer, found {n}"))),
            Some(serde_yaml::Value::String(s)) => s
                .trim()
                .parse::<usize>()
                .map(Some)
                .map_err(|e| invalid(format!("{s:?}: {e}"))),
            Some(other) => Err(invalid(format!(
                "expected an integer, found {}",
                type_name(other)
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

pub(crate) fn slot_name(prefix: &str, index: usize) -> String {
    format!("{prefix}{index}")
}

fn type_name(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}
