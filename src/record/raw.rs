//! Decoded recording events: typed, ordered field bags keyed by event type id.

#![allow(missing_docs)]

use std::time::Duration;

/// One typed field value inside a decoded record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Duration(Duration),
    /// Epoch millis.
    Timestamp(i64),
    /// Nested structured value (e.g. a heap-space sub-object).
    Nested(Vec<(String, FieldValue)>),
}

/// One decoded event from the recording session.
///
/// Owned by the harvest cycle that drained it; mapped exactly once, then
/// discarded. Field order is preserved from the decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    type_id: String,
    timestamp_ms: i64,
    duration: Option<Duration>,
    fields: Vec<(String, FieldValue)>,
}

impl RawRecord {
    #[must_use]
    pub fn new(type_id: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            type_id: type_id.into(),
            timestamp_ms,
            duration: None,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    #[must_use]
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    #[must_use]
    pub const fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    #[must_use]
    pub const fn duration(&self) -> Option<Duration> {
        self.duration
    }

    #[must_use]
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Integer field, with lossless widening from Timestamp.
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.field(name)? {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Float field, with widening from Int.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.field(name)? {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        match self.field(name)? {
            FieldValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn bool_field(&self, name: &str) -> Option<bool> {
        match self.field(name)? {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn duration_field(&self, name: &str) -> Option<Duration> {
        match self.field(name)? {
            FieldValue::Duration(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn nested(&self, name: &str) -> Option<&[(String, FieldValue)]> {
        match self.field(name)? {
            FieldValue::Nested(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

/// Field lookup inside a nested value.
#[must_use]
pub fn nested_int(fields: &[(String, FieldValue)], name: &str) -> Option<i64> {
    fields.iter().find(|(n, _)| n == name).and_then(|(_, v)| match v {
        FieldValue::Int(value) => Some(*value),
        FieldValue::Timestamp(value) => Some(*value),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawRecord {
        RawRecord::new("jdk.GCHeapSummary", 1_000)
            .with_field("heapUsed", FieldValue::Int(42))
            .with_field("when", FieldValue::Str("After GC".to_string()))
            .with_field(
                "heapSpace",
                FieldValue::Nested(vec![
                    ("committedSize".to_string(), FieldValue::Int(512)),
                    ("reservedSize".to_string(), FieldValue::Int(1024)),
                ]),
            )
    }

    #[test]
    fn typed_accessors() {
        let rec = sample();
        assert_eq!(rec.int("heapUsed"), Some(42));
        assert_eq!(rec.str_field("when"), Some("After GC"));
        assert!(rec.has_field("heapSpace"));
        assert_eq!(rec.int("missing"), None);
    }

    #[test]
    fn type_mismatch_returns_none() {
        let rec = sample();
        assert_eq!(rec.str_field("heapUsed"), None);
        assert_eq!(rec.bool_field("when"), None);
    }

    #[test]
    fn float_widens_from_int() {
        let rec = sample();
        assert_eq!(rec.float("heapUsed"), Some(42.0));
    }

    #[test]
    fn nested_lookup() {
        let rec = sample();
        let space = rec.nested("heapSpace").unwrap();
        assert_eq!(nested_int(space, "committedSize"), Some(512));
        assert_eq!(nested_int(space, "absent"), None);
    }

    #[test]
    fn field_order_is_preserved() {
        let rec = sample();
        let names: Vec<&str> = rec.fields().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["heapUsed", "when", "heapSpace"]);
    }
}
