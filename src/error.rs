//! Error types for the grep filter crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GrepError>;

/// Errors raised while turning configuration parameters into a [`RuleSet`].
///
/// Every variant is fatal to configuration: a single bad slot aborts the
/// whole build and no partially populated rule set is ever returned.
///
/// [`RuleSet`]: crate::rules::RuleSet
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{param} does not contain 2 parameters")]
    MissingPattern { param: String },

    #[error("{param} contains a duplicated key, {key}")]
    DuplicateKey { param: String, key: String },

    #[error("{param} has an invalid regex pattern: {message}")]
    InvalidRegex { param: String, message: String },

    #[error("too many {group} rules (maximum {max})")]
    TooManyRules { group: &'static str, max: usize },

    #[error("invalid value for {param}: {message}")]
    InvalidParameter { param: String, message: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("configuration parse error: {0}")]
    Parse(String),
}

/// Errors raised while matching a single field value against a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// The value is not valid UTF-8. Recovered once by scrubbing.
    #[error("invalid byte sequence in UTF-8 for field `{field}` (valid up to byte {valid_up_to})")]
    InvalidEncoding { field: String, valid_up_to: usize },

    #[error("value of field `{field}` is {len} bytes, exceeding the limit of {limit}")]
    ValueTooLarge {
        field: String,
        len: usize,
        limit: usize,
    },
}

impl MatchError {
    /// Error class name, used as the `error_class` field in log entries.
    pub fn kind(&self) -> &'static str {
        match self {
            MatchError::InvalidEncoding { .. } => "InvalidEncoding",
            MatchError::ValueTooLarge { .. } => "ValueTooLarge",
        }
    }
}

/// Batch-level failure: one event raised an error that the matcher did not
/// recover from, so no output is delivered for the whole batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("failed to grep events for tag `{tag}` at event {event_index}: {source}")]
    Aborted {
        tag: String,
        event_index: usize,
        #[source]
        source: MatchError,
    },
}

impl FilterError {
    /// The match failure that aborted the batch.
    pub fn match_error(&self) -> &MatchError {
        match self {
            FilterError::Aborted { source, .. } => source,
        }
    }
}

/// Umbrella error for callers that drive both configuration and filtering.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrepError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("match error: {0}")]
    Match(#[from] MatchError),

    #[error(transparent)]
    Filter(#[from] FilterError),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_missing_pattern_message() {
        let error = ConfigError::MissingPattern {
            param: "regexp1".to_string(),
        };
        assert_eq!(error.to_string(), "regexp1 does not contain 2 parameters");
    }

    #[test]
    fn test_duplicate_key_message() {
        let error = ConfigError::DuplicateKey {
            param: "exclude2".to_string(),
            key: "message".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "exclude2 contains a duplicated key, message"
        );
    }

    #[test]
    fn test_invalid_regex_names_param() {
        let error = ConfigError::InvalidRegex {
            param: "regexp4".to_string(),
            message: "unclosed group".to_string(),
        };
        let display = error.to_string();
        assert!(display.contains("regexp4"));
        assert!(display.contains("unclosed group"));
    }

    #[test]
    fn test_match_error_kind() {
        let encoding = MatchError::InvalidEncoding {
            field: "message".to_string(),
            valid_up_to: 3,
        };
        assert_eq!(encoding.kind(), "InvalidEncoding");

        let too_large = MatchError::ValueTooLarge {
            field: "message".to_string(),
            len: 10,
            limit: 4,
        };
        assert_eq!(too_large.kind(), "ValueTooLarge");
        assert!(too_large.to_string().contains("10 bytes"));
    }

    #[test]
    fn test_filter_error_source() {
        let error = FilterError::Aborted {
            tag: "app.log".to_string(),
            event_index: 2,
            source: MatchError::ValueTooLarge {
                field: "message".to_string(),
                len: 10,
                limit: 4,
            },
        };

        let display = error.to_string();
        assert!(display.contains("app.log"));
        assert!(display.contains("event 2"));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let config_error: ConfigError = io_error.into();

        match config_error {
            ConfigError::Io(msg) => assert!(msg.contains("file not found")),
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_from_yaml_error() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("invalid: yaml: content: [")
            .unwrap_err();
        let config_error: ConfigError = yaml_err.into();
        assert!(matches!(config_error, ConfigError::Parse(_)));
    }

    #[test]
    fn test_grep_error_conversions() {
        let err: GrepError = ConfigError::MissingPattern {
            param: "regexp1".to_string(),
        }
        .into();
        assert!(matches!(err, GrepError::Config(_)));
        assert!(err.to_string().starts_with("configuration error"));

        let err: GrepError = MatchError::InvalidEncoding {
            field: "f".to_string(),
            valid_up_to: 0,
        }
        .into();
        assert!(matches!(err, GrepError::Match(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn test_function() -> Result<i32> {
            Err(ConfigError::TooManyRules {
                group: "regexp",
                max: 20,
            }
            .into())
        }

        match test_function().unwrap_err() {
            GrepError::Config(ConfigError::TooManyRules { max, .. }) => assert_eq!(max, 20),
            other => panic!("Expected TooManyRules, got {other:?}"),
        }
    }
}
