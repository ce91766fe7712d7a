//! Rule set compilation.
//!
//! A [`RuleSet`] holds two independent [`RuleGroup`]s: required patterns,
//! every one of which must match, and exclusion patterns, none of which may
//! match. Within a group a field name appears at most once; the two groups
//! may name the same field.
//!
//! ## Example
//!
//! ```rust
//! use record_grep::config::GrepConfig;
//! use record_grep::rules::RuleSet;
//!
//! let config = GrepConfig::new()
//!     .with_param("regexp1", "message ^ERROR")
//!     .with_param("exclude1", "host ^test-");
//!
//! let rules = RuleSet::from_config(&config)?;
//! assert_eq!(rules.required().len(), 1);
//! assert!(rules.excludes().contains("host"));
//! # Ok::<(), record_grep::ConfigError>(())
//! ```

use crate::config::{
    slot_name, GrepConfig, MatchConfig, EXCLUDE_PREFIX, REGEXP_MAX_NUM, REGEXP_PREFIX,
};
use crate::error::{ConfigError, MatchError};
use crate::matcher;
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// One compiled `(field, pattern)` pair.
#[derive(Debug, Clone)]
pub struct PatternRule {
    /// Configuration parameter this rule came from, e.g. `regexp3`.
    param: String,
    field: String,
    pattern: Regex,
}

impl PatternRule {
    pub fn param(&self) -> &str {
        &self.param
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Match this rule's pattern against `text`, the value of its field.
    pub fn is_match(&self, text: &[u8], config: &MatchConfig) -> Result<bool, MatchError> {
        matcher::match_text(&self.pattern, &self.field, text, config)
    }
}

/// Ordered rules with unique field names.
#[derive(Debug, Clone)]
pub struct RuleGroup {
    name: &'static str,
    rules: Vec<PatternRule>,
}

impl RuleGroup {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            rules: Vec::new(),
        }
    }

    /// Group name, the slot prefix (`regexp` or `exclude`).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Append a rule. Uniqueness is checked before the pattern is compiled,
    /// so a duplicated field fails even when its pattern is invalid.
    fn insert(
        &mut self,
        param: String,
        field: &str,
        pattern: &str,
        config: &MatchConfig,
    ) -> Result<(), ConfigError> {
        if self.contains(field) {
            return Err(ConfigError::DuplicateKey {
                param,
                key: field.to_string(),
            });
        }
        if self.rules.len() >= REGEXP_MAX_NUM {
            return Err(ConfigError::TooManyRules {
                group: self.name,
                max: REGEXP_MAX_NUM,
            });
        }

        let pattern = compile(&param, pattern, config)?;
        self.rules.push(PatternRule {
            param,
            field: field.to_string(),
            pattern,
        });
        Ok(())
    }

    pub fn get(&self, field: &str) -> Option<&PatternRule> {
        self.rules.iter().find(|rule| rule.field == field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatternRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a RuleGroup {
    type Item = &'a PatternRule;
    type IntoIter = std::slice::Iter<'a, PatternRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// Compiled required and exclusion rules. Immutable once built.
#[derive(Debug, Clone)]
pub struct RuleSet {
    required: RuleGroup,
    excludes: RuleGroup,
}

impl RuleSet {
    /// Compile the `regexp<i>` and `exclude<i>` slots of `config`.
    ///
    /// Slots are read in ascending index order, 1 through
    /// [`REGEXP_MAX_NUM`]; higher indices are never looked at. The first
    /// malformed slot aborts the build.
    pub fn from_config(config: &GrepConfig) -> Result<Self, ConfigError> {
        Self::from_config_with(config, &config.match_config()?)
    }

    /// Like [`RuleSet::from_config`], compiling with limits the caller has
    /// already read from `config`.
    pub fn from_config_with(
        config: &GrepConfig,
        match_config: &MatchConfig,
    ) -> Result<Self, ConfigError> {
        let mut required = RuleGroup::new(REGEXP_PREFIX);
        for index in 1..=REGEXP_MAX_NUM {
            if let Some(value) = config.regexp(index)? {
                add_slot(&mut required, index, value, match_config)?;
            }
        }

        let mut excludes = RuleGroup::new(EXCLUDE_PREFIX);
        for index in 1..=REGEXP_MAX_NUM {
            if let Some(value) = config.exclude(index)? {
                add_slot(&mut excludes, index, value, match_config)?;
            }
        }

        debug!(
            required = required.len(),
            excludes = excludes.len(),
            "compiled grep rules"
        );

        Ok(Self { required, excludes })
    }

    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::new()
    }

    pub fn required(&self) -> &RuleGroup {
        &self.required
    }

    pub fn excludes(&self) -> &RuleGroup {
        &self.excludes
    }

    /// True when neither group has a rule; such a set keeps every record.
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.excludes.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            required: RuleGroup::new(REGEXP_PREFIX),
            excludes: RuleGroup::new(EXCLUDE_PREFIX),
        }
    }
}

/// Programmatic construction of a [`RuleSet`], applying the same checks as
/// [`RuleSet::from_config`]. Rules are named `regexp<n>` / `exclude<n>` in
/// the order they are added.
///
/// ```rust
/// use record_grep::rules::RuleSet;
///
/// let rules = RuleSet::builder()
///     .require("message", "^ERROR")?
///     .exclude("level", "^DEBUG$")?
///     .build();
/// assert_eq!(rules.required().iter().next().unwrap().param(), "regexp1");
/// # Ok::<(), record_grep::ConfigError>(())
/// ```
#[derive(Debug, Default)]
pub struct RuleSetBuilder {
    rules: RuleSet,
    match_config: MatchConfig,
}

impl RuleSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits used when compiling subsequently added patterns.
    pub fn with_match_config(mut self, match_config: MatchConfig) -> Self {
        self.match_config = match_config;
        self
    }

    pub fn require(mut self, field: &str, pattern: &str) -> Result<Self, ConfigError> {
        let param = slot_name(REGEXP_PREFIX, self.rules.required.len() + 1);
        self.rules
            .required
            .insert(param, field, pattern, &self.match_config)?;
        Ok(self)
    }

    pub fn exclude(mut self, field: &str, pattern: &str) -> Result<Self, ConfigError> {
        let param = slot_name(EXCLUDE_PREFIX, self.rules.excludes.len() + 1);
        self.rules
            .excludes
            .insert(param, field, pattern, &self.match_config)?;
        Ok(self)
    }

    pub fn build(self) -> RuleSet {
        self.rules
    }
}

fn add_slot(
    group: &mut RuleGroup,
    index: usize,
    value: &str,
    config: &MatchConfig,
) -> Result<(), ConfigError> {
    let param = slot_name(group.name, index);
    let (field, pattern) = split_slot(&param, value)?;
    group.insert(param, field, pattern, config)
}

/// Split `"<field> <pattern>"` on the first space. The pattern keeps any
/// further spaces, leading ones included.
fn split_slot<'a>(param: &str, value: &'a str) -> Result<(&'a str, &'a str), ConfigError> {
    value
        .split_once(' ')
        .ok_or_else(|| ConfigError::MissingPattern {
            param: param.to_string(),
        })
}

fn compile(param: &str, pattern: &str, config: &MatchConfig) -> Result<Regex, ConfigError> {
    let mut builder = RegexBuilder::new(pattern);
    if let Some(limit) = config.regex_size_limit {
        builder.size_limit(limit);
    }
    builder.build().map_err(|e| ConfigError::InvalidRegex {
        param: param.to_string(),
        message: e.to_string(),
    })
}
