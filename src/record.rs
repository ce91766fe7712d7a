//! Event and record model consumed by the grep filter.
//!
//! Records arrive from an upstream producer and are never modified here.
//! Field values may carry raw bytes that are not valid UTF-8; turning a value
//! into text therefore yields bytes, and encoding problems surface only when a
//! pattern is matched against them.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// A single field value inside a record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    /// Integers above `i64::MAX`.
    UInt(u64),
    Float(f64),
    String(String),
    /// Raw text as received, not validated.
    Bytes(Vec<u8>),
    Array(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Textual form of the value, used as the subject of pattern matches.
    ///
    /// Conversion never fails: `Null` is empty, scalars use their display
    /// form, and nested values render as compact JSON.
    pub fn to_text(&self) -> Cow<'_, [u8]> {
        match self {
            FieldValue::Null => Cow::Borrowed(&[]),
            FieldValue::String(s) => Cow::Borrowed(s.as_bytes()),
            FieldValue::Bytes(b) => Cow::Borrowed(b.as_slice()),
            FieldValue::Bool(b) => Cow::Owned(b.to_string().into_bytes()),
            FieldValue::Integer(i) => Cow::Owned(i.to_string().into_bytes()),
            FieldValue::UInt(u) => Cow::Owned(u.to_string().into_bytes()),
            // Same form as inside nested values; non-finite floats have no
            // JSON number form and fall back to `Display`.
            FieldValue::Float(f) => match serde_json::Number::from_f64(*f) {
                Some(n) => Cow::Owned(n.to_string().into_bytes()),
                None => Cow::Owned(f.to_string().into_bytes()),
            },
            FieldValue::Array(_) | FieldValue::Map(_) => {
                Cow::Owned(self.to_json().to_string().into_bytes())
            }
        }
    }

    fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::UInt(u) => Value::from(*u),
            FieldValue::Float(f) => Value::from(*f),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
            FieldValue::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            FieldValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    FieldValue::UInt(u)
                } else {
                    FieldValue::Float(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) => FieldValue::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                FieldValue::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(i) => FieldValue::Integer(i),
            Err(_) => FieldValue::UInt(value),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Structured key-value payload of one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, convenient for constructing test and bench data.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Textual form of `field`, or empty text when the field is absent.
    pub fn text_of(&self, field: &str) -> Cow<'_, [u8]> {
        match self.fields.get(field) {
            Some(value) => value.to_text(),
            None => Cow::Borrowed(&[]),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl TryFrom<serde_json::Value> for Record {
    type Error = serde_json::Value;

    /// Converts a JSON object; any other JSON value is handed back unchanged.
    fn try_from(value: serde_json::Value) -> std::result::Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(other),
        }
    }
}

/// Event timestamp with nanosecond resolution. Opaque to the filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventTime {
    pub seconds: i64,
    pub nanoseconds: u32,
}

impl EventTime {
    pub fn new(seconds: i64, nanoseconds: u32) -> Self {
        Self {
            seconds,
            nanoseconds,
        }
    }

    pub fn from_secs(seconds: i64) -> Self {
        Self::new(seconds, 0)
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanoseconds)
    }
}

/// A timestamped record.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub time: EventTime,
    pub record: Record,
}

impl Event {
    pub fn new(time: EventTime, record: Record) -> Self {
        Self { time, record }
    }
}

/// Ordered batch of events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventStream {
    events: Vec<Event>,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, time: EventTime, record: Record) {
        self.events.push(Event::new(time, record));
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.events.iter().map(|event| &event.record)
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

impl From<Vec<Event>> for EventStream {
    fn from(events: Vec<Event>) -> Self {
        Self { events }
    }
}

impl FromIterator<Event> for EventStream {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EventStream {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl IntoIterator for EventStream {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}
