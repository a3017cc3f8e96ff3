//! Vendor-neutral telemetry primitives: metrics, spans, log events.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::telemetry::attributes::Attributes;

/// Metric kind, part of a metric's merge identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Count,
    Gauge,
    Summary,
}

/// Kind-specific metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricPayload {
    Count(f64),
    Gauge(f64),
    Summary {
        count: u64,
        sum: f64,
        min: f64,
        max: f64,
    },
}

impl MetricPayload {
    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        match self {
            Self::Count(_) => MetricKind::Count,
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Summary { .. } => MetricKind::Summary,
        }
    }
}

/// Identity under which same-cycle metrics merge: name + kind + attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricIdentity {
    pub name: String,
    pub kind: MetricKind,
    pub attributes: Attributes,
}

/// One metric data point or interval summary.
///
/// Counts and gauges are instants (`start_ms == end_ms`); summaries span the
/// interval they aggregated over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub payload: MetricPayload,
    pub attributes: Attributes,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl Metric {
    #[must_use]
    pub fn count(
        name: impl Into<String>,
        value: f64,
        timestamp_ms: i64,
        attributes: Attributes,
    ) -> Self {
        Self {
            name: name.into(),
            payload: MetricPayload::Count(value),
            attributes,
            start_ms: timestamp_ms,
            end_ms: timestamp_ms,
        }
    }

    #[must_use]
    pub fn gauge(
        name: impl Into<String>,
        value: f64,
        timestamp_ms: i64,
        attributes: Attributes,
    ) -> Self {
        Self {
            name: name.into(),
            payload: MetricPayload::Gauge(value),
            attributes,
            start_ms: timestamp_ms,
            end_ms: timestamp_ms,
        }
    }

    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn summary(
        name: impl Into<String>,
        count: u64,
        sum: f64,
        min: f64,
        max: f64,
        start_ms: i64,
        end_ms: i64,
        attributes: Attributes,
    ) -> Self {
        Self {
            name: name.into(),
            payload: MetricPayload::Summary {
                count,
                sum,
                min,
                max,
            },
            attributes,
            start_ms,
            end_ms,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        self.payload.kind()
    }

    #[must_use]
    pub fn identity(&self) -> MetricIdentity {
        MetricIdentity {
            name: self.name.clone(),
            kind: self.kind(),
            attributes: self.attributes.clone(),
        }
    }

    /// Fold another same-identity metric into this one.
    ///
    /// Counts sum; gauges keep the latest observation; summaries accumulate
    /// count/sum and widen min/max and the covered interval.
    pub fn merge(&mut self, other: &Self) {
        debug_assert_eq!(self.kind(), other.kind(), "merge requires same identity");
        match (&mut self.payload, &other.payload) {
            (MetricPayload::Count(mine), MetricPayload::Count(theirs)) => {
                *mine += theirs;
                self.start_ms = self.start_ms.min(other.start_ms);
                self.end_ms = self.end_ms.max(other.end_ms);
            }
            (MetricPayload::Gauge(mine), MetricPayload::Gauge(theirs)) => {
                if other.end_ms >= self.end_ms {
                    *mine = *theirs;
                    self.start_ms = other.start_ms;
                    self.end_ms = other.end_ms;
                }
            }
            (
                MetricPayload::Summary {
                    count: my_count,
                    sum: my_sum,
                    min: my_min,
                    max: my_max,
                },
                MetricPayload::Summary {
                    count,
                    sum,
                    min,
                    max,
                },
            ) => {
                *my_count += count;
                *my_sum += sum;
                *my_min = my_min.min(*min);
                *my_max = my_max.max(*max);
                self.start_ms = self.start_ms.min(other.start_ms);
                self.end_ms = self.end_ms.max(other.end_ms);
            }
            _ => {}
        }
    }
}

/// One timed operation extracted from a recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub name: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub attributes: Attributes,
}

/// One discrete occurrence worth reporting as a structured event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub name: String,
    pub timestamp_ms: i64,
    pub attributes: Attributes,
}

/// Tagged variant over everything a mapper can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryItem {
    Metric(Metric),
    Span(Span),
    LogEvent(LogEvent),
}

impl From<Metric> for TelemetryItem {
    fn from(value: Metric) -> Self {
        Self::Metric(value)
    }
}

impl From<Span> for TelemetryItem {
    fn from(value: Span) -> Self {
        Self::Span(value)
    }
}

impl From<LogEvent> for TelemetryItem {
    fn from(value: LogEvent) -> Self {
        Self::LogEvent(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_merge_by_summation() {
        let attrs = Attributes::new().put("name", "a");
        let mut first = Metric::count("a.count", 1.0, 100, attrs.clone());
        let second = Metric::count("a.count", 2.0, 200, attrs);
        first.merge(&second);
        assert_eq!(first.payload, MetricPayload::Count(3.0));
        assert_eq!(first.start_ms, 100);
        assert_eq!(first.end_ms, 200);
    }

    #[test]
    fn gauges_keep_latest_observation() {
        let attrs = Attributes::new();
        let mut first = Metric::gauge("heap.used", 10.0, 100, attrs.clone());
        let newer = Metric::gauge("heap.used", 20.0, 200, attrs.clone());
        first.merge(&newer);
        assert_eq!(first.payload, MetricPayload::Gauge(20.0));

        // An older observation arriving late does not win.
        let older = Metric::gauge("heap.used", 5.0, 50, attrs);
        first.merge(&older);
        assert_eq!(first.payload, MetricPayload::Gauge(20.0));
    }

    #[test]
    fn summaries_accumulate_and_widen() {
        let attrs = Attributes::new();
        let mut first = Metric::summary("gc.duration", 2, 30.0, 10.0, 20.0, 100, 200, attrs.clone());
        let second = Metric::summary("gc.duration", 1, 5.0, 5.0, 5.0, 250, 300, attrs);
        first.merge(&second);
        assert_eq!(
            first.payload,
            MetricPayload::Summary {
                count: 3,
                sum: 35.0,
                min: 5.0,
                max: 20.0,
            }
        );
        assert_eq!(first.start_ms, 100);
        assert_eq!(first.end_ms, 300);
    }

    #[test]
    fn identity_distinguishes_kind_and_attributes() {
        let a = Metric::count("m", 1.0, 0, Attributes::new());
        let b = Metric::gauge("m", 1.0, 0, Attributes::new());
        let c = Metric::count("m", 1.0, 0, Attributes::new().put("k", "v"));
        assert_ne!(a.identity(), b.identity());
        assert_ne!(a.identity(), c.identity());
    }

    #[test]
    fn item_serializes_with_type_tag() {
        let item = TelemetryItem::Metric(Metric::gauge("g", 1.5, 7, Attributes::new()));
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains(r#""type":"metric""#), "{json}");
        assert!(json.contains(r#""gauge":1.5"#), "{json}");
    }
}
