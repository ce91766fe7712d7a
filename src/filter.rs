//! Grep filter stage.
//!
//! [`GrepFilter`] applies a [`RuleSet`] to each event of a batch and keeps the
//! events whose record passes every required rule and no exclusion rule.
//! Survivors keep their original relative order.
//!
//! A batch is all-or-nothing. If any event raises a [`MatchError`] that the
//! matcher did not recover from, the whole call fails with
//! [`FilterError::Aborted`], a warning plus a backtrace is logged, and the
//! events already accepted are dropped with the rest of the batch.
//!
//! # Example
//!
//! ```rust
//! use record_grep::{EventStream, EventTime, Filter, GrepConfig, GrepFilter, Record};
//!
//! let filter = GrepFilter::from_config(
//!     &GrepConfig::new().with_param("regexp1", "message ^ERROR"),
//! )?;
//!
//! let mut events = EventStream::new();
//! events.add(EventTime::from_secs(1), Record::new().with("message", "ERROR disk full"));
//! events.add(EventTime::from_secs(2), Record::new().with("message", "INFO ok"));
//!
//! let kept = filter.filter_stream("app.log", &events)?;
//! assert_eq!(kept.len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::{GrepConfig, MatchConfig};
use crate::error::{ConfigError, FilterError, MatchError};
use crate::record::{EventStream, Record};
use crate::rules::RuleSet;
use std::backtrace::Backtrace;
use tracing::{trace, warn};

/// Interface a host pipeline uses to drive a filter stage.
pub trait Filter {
    /// Filter one batch of events routed under `tag`.
    fn filter_stream(&self, tag: &str, events: &EventStream) -> Result<EventStream, FilterError>;

    /// Like [`Filter::filter_stream`], treating a failed batch as one that
    /// emitted no events. The failure has already been logged.
    fn filter_stream_or_empty(&self, tag: &str, events: &EventStream) -> EventStream {
        self.filter_stream(tag, events).unwrap_or_default()
    }
}

/// Keeps records matching all required patterns and no exclusion pattern.
///
/// The filter holds no mutable state, so one instance can serve concurrent
/// callers (e.g. behind an `Arc`) as long as each brings its own batch.
#[derive(Debug, Clone, Default)]
pub struct GrepFilter {
    rules: RuleSet,
    match_config: MatchConfig,
}

impl GrepFilter {
    pub fn new(rules: RuleSet, match_config: MatchConfig) -> Self {
        Self {
            rules,
            match_config,
        }
    }

    /// Compile the rules and limits held in `config`.
    pub fn from_config(config: &GrepConfig) -> Result<Self, ConfigError> {
        let match_config = config.match_config()?;
        let rules = RuleSet::from_config_with(config, &match_config)?;
        Ok(Self::new(rules, match_config))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn match_config(&self) -> &MatchConfig {
        &self.match_config
    }

    /// Decide whether `record` survives the filter.
    ///
    /// Required rules are checked first, in order, stopping at the first that
    /// does not match; exclusion rules are only checked when all required
    /// rules matched, stopping at the first that does. A missing field is
    /// matched as empty text.
    pub fn keep(&self, record: &Record) -> Result<bool, MatchError> {
        for rule in self.rules.required() {
            if !rule.is_match(&record.text_of(rule.field()), &self.match_config)? {
                return Ok(false);
            }
        }

        for rule in self.rules.excludes() {
            if rule.is_match(&record.text_of(rule.field()), &self.match_config)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn grep(&self, tag: &str, events: &EventStream) -> Result<EventStream, FilterError> {
        let mut result = EventStream::with_capacity(events.len());

        for (event_index, event) in events.iter().enumerate() {
            let keep = self
                .keep(&event.record)
                .map_err(|source| FilterError::Aborted {
                    tag: tag.to_string(),
                    event_index,
                    source,
                })?;

            if keep {
                result.push(event.clone());
            }
        }

        Ok(result)
    }
}

impl Filter for GrepFilter {
    fn filter_stream(&self, tag: &str, events: &EventStream) -> Result<EventStream, FilterError> {
        match self.grep(tag, events) {
            Ok(result) => {
                trace!(
                    tag,
                    input = events.len(),
                    output = result.len(),
                    "grep filtered batch"
                );
                Ok(result)
            }
            Err(err) => {
                let source = err.match_error();
                warn!(
                    tag,
                    error_class = source.kind(),
                    error = %source,
                    "failed to grep events"
                );
                warn!(tag, "{}", Backtrace::force_capture());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EventTime;
    use tracing_test::traced_test;

    fn stream(records: Vec<Record>) -> EventStream {
        records
            .into_iter()
            .enumerate()
            .map(|(i, record)| crate::record::Event::new(EventTime::from_secs(i as i64), record))
            .collect()
    }

    fn message(text: &str) -> Record {
        Record::new().with("message", text)
    }

    #[test]
    fn test_no_rules_keeps_everything() {
        let filter = GrepFilter::default();
        let events = stream(vec![message("a"), Record::new(), message("b")]);

        let result = filter.filter_stream("tag", &events).unwrap();
        assert_eq!(result, events);
    }

    #[test]
    fn test_required_rule() {
        let filter = GrepFilter::new(
            RuleSet::builder().require("message", "^ERROR").unwrap().build(),
            MatchConfig::default(),
        );

        assert!(filter.keep(&message("ERROR disk full")).unwrap());
        assert!(!filter.keep(&message("INFO ok")).unwrap());
    }

    #[test]
    fn test_exclude_rule() {
        let filter = GrepFilter::new(
            RuleSet::builder().exclude("level", "^DEBUG$").unwrap().build(),
            MatchConfig::default(),
        );

        assert!(!filter.keep(&Record::new().with("level", "DEBUG")).unwrap());
        assert!(filter.keep(&Record::new().with("level", "WARN")).unwrap());
    }

    #[test]
    fn test_missing_field_matches_as_empty() {
        let required_empty = GrepFilter::new(
            RuleSet::builder().require("host", "^$").unwrap().build(),
            MatchConfig::default(),
        );
        assert!(required_empty.keep(&message("no host here")).unwrap());

        let exclude_anything = GrepFilter::new(
            RuleSet::builder().exclude("host", ".").unwrap().build(),
            MatchConfig::default(),
        );
        assert!(exclude_anything.keep(&message("no host here")).unwrap());
    }

    #[test]
    fn test_non_string_values_are_stringified() {
        let filter = GrepFilter::new(
            RuleSet::builder()
                .require("code", "^5\\d\\d$")
                .unwrap()
                .require("ok", "^false$")
                .unwrap()
                .build(),
            MatchConfig::default(),
        );

        let record = Record::new().with("code", 503i64).with("ok", false);
        assert!(filter.keep(&record).unwrap());
    }

    #[traced_test]
    #[test]
    fn test_failed_required_skips_exclude() {
        let filter = GrepFilter::new(
            RuleSet::builder()
                .require("host", "^web")
                .unwrap()
                .exclude("host", "db")
                .unwrap()
                .build(),
            MatchConfig::default(),
        );

        // Invalid bytes make each evaluated rule log one note, so the number
        // of notes equals the number of rules that ran.
        let record = Record::new().with("host", b"db\xff01".to_vec());
        assert!(!filter.keep(&record).unwrap());

        logs_assert(|lines: &[&str]| {
            let notes = lines
                .iter()
                .filter(|line| line.contains("invalid byte sequence is replaced"))
                .count();
            match notes {
                1 => Ok(()),
                n => Err(format!("expected 1 sanitization note, found {n}")),
            }
        });
    }

    #[traced_test]
    #[test]
    fn test_invalid_encoding_does_not_abort_batch() {
        let filter = GrepFilter::new(
            RuleSet::builder().require("message", "^ERROR").unwrap().build(),
            MatchConfig::default(),
        );
        let events = stream(vec![
            Record::new().with("message", b"ERROR \xffbad".to_vec()),
            message("INFO ok"),
        ]);

        let result = filter.filter_stream("app", &events).unwrap();
        assert_eq!(result.len(), 1);
        // The forwarded record is the original, not the scrubbed copy.
        assert_eq!(
            result.iter().next().unwrap().record.get("message"),
            Some(&crate::record::FieldValue::Bytes(b"ERROR \xffbad".to_vec()))
        );
        assert!(logs_contain("ERROR ?bad"));
        assert!(!logs_contain("failed to grep events"));
    }

    #[traced_test]
    #[test]
    fn test_unrecoverable_error_aborts_whole_batch() {
        let filter = GrepFilter::new(
            RuleSet::builder().require("message", "ERROR").unwrap().build(),
            MatchConfig::new().with_max_value_bytes(16),
        );
        let events = stream(vec![
            message("ERROR short"),
            message("ERROR this message is far too long"),
            message("ERROR after"),
        ]);

        let err = filter.filter_stream("app.log", &events).unwrap_err();
        match &err {
            FilterError::Aborted {
                tag, event_index, ..
            } => {
                assert_eq!(tag, "app.log");
                assert_eq!(*event_index, 1);
            }
        }
        assert_eq!(err.match_error().kind(), "ValueTooLarge");

        assert!(logs_contain("failed to grep events"));
        assert!(logs_contain("ValueTooLarge"));

        // One warning for the failure, one carrying the backtrace.
        logs_assert(|lines: &[&str]| {
            let warnings: Vec<_> = lines.iter().filter(|line| line.contains("WARN")).collect();
            if warnings.len() != 2 {
                return Err(format!("expected 2 warnings, found {}", warnings.len()));
            }
            if warnings[1].contains("failed to grep events") {
                return Err("second warning should carry the backtrace".to_string());
            }
            Ok(())
        });
    }

    #[traced_test]
    #[test]
    fn test_filter_stream_or_empty() {
        let filter = GrepFilter::new(
            RuleSet::builder().require("message", ".").unwrap().build(),
            MatchConfig::new().with_max_value_bytes(1),
        );
        let events = stream(vec![message("a"), message("too long")]);

        assert!(filter.filter_stream_or_empty("app", &events).is_empty());
    }

    #[test]
    fn test_from_config() {
        let config = GrepConfig::new()
            .with_param("regexp1", "message ^ERROR")
            .with_param("max_value_bytes", "1024");

        let filter = GrepFilter::from_config(&config).unwrap();
        assert_eq!(filter.rules().required().len(), 1);
        assert_eq!(filter.match_config().max_value_bytes, Some(1024));
    }

    #[test]
    fn test_filter_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GrepFilter>();
    }
}
