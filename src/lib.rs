//! # record-grep
//!
//! A grep filter stage for structured log-event pipelines. Each event is a
//! timestamp plus a record of named fields; the filter keeps the events whose
//! fields match every configured required pattern and none of the configured
//! exclusion patterns.
//!
//! ## Quick Start
//!
//! ```rust
//! use record_grep::{EventStream, EventTime, Filter, GrepConfig, GrepFilter, Record};
//!
//! let config = GrepConfig::from_yaml_str(
//!     r#"
//! regexp1: "message ^ERROR"
//! exclude1: "host ^test-"
//! "#,
//! )?;
//! let filter = GrepFilter::from_config(&config)?;
//!
//! let mut events = EventStream::new();
//! events.add(
//!     EventTime::from_secs(1),
//!     Record::new().with("message", "ERROR disk full").with("host", "web01"),
//! );
//! events.add(
//!     EventTime::from_secs(2),
//!     Record::new().with("message", "ERROR disk full").with("host", "test-01"),
//! );
//! events.add(EventTime::from_secs(3), Record::new().with("message", "INFO ok"));
//!
//! let kept = filter.filter_stream("app.log", &events)?;
//! assert_eq!(kept.len(), 1);
//!
//! // Single records can be checked without a batch.
//! assert!(!filter.keep(&Record::new().with("message", "INFO ok"))?);
//! # Ok::<(), record_grep::GrepError>(())
//! ```
//!
//! ## Failure model
//!
//! Configuration is validated eagerly: a malformed slot, a duplicated field
//! within a group, or an invalid regex fails [`GrepFilter::from_config`].
//! At filtering time, values that are not valid UTF-8 are scrubbed and
//! matched again; any other match failure aborts the whole batch with a
//! [`FilterError`].
//!
//! Each stage has its own error type. [`GrepError`] and the [`Result`] alias
//! unify them for callers that drive every stage with `?`.

pub mod config;
pub mod error;
pub mod filter;
pub mod matcher;
pub mod record;
pub mod rules;

pub use config::{GrepConfig, MatchConfig, REGEXP_MAX_NUM};
pub use error::{ConfigError, FilterError, GrepError, MatchError, Result};
pub use filter::{Filter, GrepFilter};
pub use record::{Event, EventStream, EventTime, FieldValue, Record};
pub use rules::{PatternRule, RuleGroup, RuleSet, RuleSetBuilder};
