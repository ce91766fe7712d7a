//! Matching a compiled pattern against one field value.
//!
//! Patterns are Unicode regexes, so a subject must be valid UTF-8. A value
//! that is not gets exactly one second chance: invalid sequences are replaced
//! with [`REPLACEMENT_CHAR`] and the same match is retried. Every other
//! failure is returned to the caller untouched.

use crate::config::MatchConfig;
use crate::error::MatchError;
use regex::Regex;
use std::borrow::Cow;
use tracing::info;

/// Placeholder written over each invalid byte sequence.
pub const REPLACEMENT_CHAR: char = '?';

/// Match `regex` against the textual value of `field`.
///
/// Runs at most two attempts. Only [`MatchError::InvalidEncoding`] on the
/// first attempt triggers the scrub-and-retry; the second attempt's result is
/// returned whatever it is.
pub fn match_text(
    regex: &Regex,
    field: &str,
    text: &[u8],
    config: &MatchConfig,
) -> Result<bool, MatchError> {
    let mut subject = Cow::Borrowed(text);
    let mut retried = false;

    loop {
        match try_match(regex, field, &subject, config) {
            Err(MatchError::InvalidEncoding { .. }) if !retried => {
                let scrubbed = scrub(&subject);
                info!(
                    field,
                    sanitized = %scrubbed,
                    "invalid byte sequence is replaced in `{}`",
                    String::from_utf8_lossy(&subject)
                );
                subject = Cow::Owned(scrubbed.into_bytes());
                retried = true;
            }
            result => return result,
        }
    }
}

fn try_match(
    regex: &Regex,
    field: &str,
    text: &[u8],
    config: &MatchConfig,
) -> Result<bool, MatchError> {
    if let Some(limit) = config.max_value_bytes {
        if text.len() > limit {
            return Err(MatchError::ValueTooLarge {
                field: field.to_string(),
                len: text.len(),
                limit,
            });
        }
    }

    let subject = std::str::from_utf8(text).map_err(|e| MatchError::InvalidEncoding {
        field: field.to_string(),
        valid_up_to: e.valid_up_to(),
    })?;

    Ok(regex.is_match(subject))
}

/// Copy `bytes` into a `String`, replacing each maximal invalid UTF-8
/// sequence with [`REPLACEMENT_CHAR`].
pub fn scrub(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
        if !chunk.invalid().is_empty() {
            out.push(REPLACEMENT_CHAR);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn regex(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap()
    }

    #[test]
    fn test_valid_text_matches() {
        let config = MatchConfig::default();
        assert!(match_text(&regex("^ERROR"), "message", b"ERROR disk full", &config).unwrap());
        assert!(!match_text(&regex("^ERROR"), "message", b"INFO ok", &config).unwrap());
    }

    #[test]
    fn test_empty_text() {
        let config = MatchConfig::default();
        assert!(match_text(&regex("^$"), "missing", b"", &config).unwrap());
        assert!(!match_text(&regex("."), "missing", b"", &config).unwrap());
    }

    #[test]
    fn test_scrub_replaces_invalid_sequences() {
        assert_eq!(scrub(b"abc"), "abc");
        assert_eq!(scrub(b"a\xffb"), "a?b");
        assert_eq!(scrub(b"\xff\xfe"), "??");
        // Truncated multi-byte sequence counts once.
        assert_eq!(scrub(b"x\xe2\x82"), "x?");
        assert_eq!(scrub("caf\u{e9}".as_bytes()), "caf\u{e9}");
    }

    #[traced_test]
    #[test]
    fn test_invalid_encoding_is_scrubbed_and_retried() {
        let config = MatchConfig::default();
        let text = b"ERROR \xff\xfe disk";

        assert!(match_text(&regex("^ERROR"), "message", text, &config).unwrap());
        assert!(match_text(&regex(r"ERROR \?\? disk"), "message", text, &config).unwrap());
        assert!(!match_text(&regex("^INFO"), "message", text, &config).unwrap());
        assert!(logs_contain("invalid byte sequence is replaced in"));
        assert!(logs_contain("ERROR ?? disk"));
    }

    #[traced_test]
    #[test]
    fn test_valid_text_logs_nothing() {
        let config = MatchConfig::default();
        assert!(match_text(&regex("ok"), "message", b"all ok", &config).unwrap());
        assert!(!logs_contain("invalid byte sequence"));
    }

    #[test]
    fn test_value_too_large_is_not_retried() {
        let config = MatchConfig::new().with_max_value_bytes(4);

        let err = match_text(&regex("."), "message", b"hello", &config).unwrap_err();
        assert_eq!(
            err,
            MatchError::ValueTooLarge {
                field: "message".to_string(),
                len: 5,
                limit: 4,
            }
        );

        assert!(match_text(&regex("^hell$"), "message", b"hell", &config).unwrap());
    }

    #[test]
    fn test_size_limit_applies_to_invalid_values() {
        let config = MatchConfig::new().with_max_value_bytes(2);
        let err = match_text(&regex("."), "message", b"\xff\xff\xff", &config).unwrap_err();
        assert_eq!(err.kind(), "ValueTooLarge");
    }
}
