//! Exposition records — the data a metric writes and the registry gathers.
//!
//! These types are the hand-off point to encoders and transports: a
//! [`MetricFamily`] carries everything needed to render any wire format,
//! and every record is serde-serializable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One label name/value pair of a series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelPair {
    pub name: String,
    pub value: String,
}

impl LabelPair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Type tag of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Summary,
    Untyped,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
            MetricType::Summary => "summary",
            MetricType::Untyped => "untyped",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Value payloads ─────────────────────────────────────────────────

/// A cumulative histogram bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Inclusive upper bound of the bucket.
    pub upper_bound: f64,
    /// Number of observations less than or equal to `upper_bound`.
    pub cumulative_count: u64,
}

/// Histogram payload. The implicit `+Inf` bucket equals `sample_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramValue {
    pub sample_count: u64,
    pub sample_sum: f64,
    pub buckets: Vec<Bucket>,
}

/// One estimated quantile of a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantile {
    pub quantile: f64,
    pub value: f64,
}

/// Summary payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryValue {
    pub sample_count: u64,
    pub sample_sum: f64,
    pub quantiles: Vec<Quantile>,
}

/// Type-specific value of one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleValue {
    Counter(f64),
    Gauge(f64),
    Untyped(f64),
    Histogram(HistogramValue),
    Summary(SummaryValue),
}

impl SampleValue {
    /// The family type this value belongs to.
    pub fn metric_type(&self) -> MetricType {
        match self {
            SampleValue::Counter(_) => MetricType::Counter,
            SampleValue::Gauge(_) => MetricType::Gauge,
            SampleValue::Untyped(_) => MetricType::Untyped,
            SampleValue::Histogram(_) => MetricType::Histogram,
            SampleValue::Summary(_) => MetricType::Summary,
        }
    }

    /// Scalar value for counters, gauges, and untyped metrics.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Counter(v) | SampleValue::Gauge(v) | SampleValue::Untyped(v) => Some(*v),
            SampleValue::Histogram(_) | SampleValue::Summary(_) => None,
        }
    }

    pub fn as_histogram(&self) -> Option<&HistogramValue> {
        match self {
            SampleValue::Histogram(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_summary(&self) -> Option<&SummaryValue> {
        match self {
            SampleValue::Summary(s) => Some(s),
            _ => None,
        }
    }
}

// ── Series and families ────────────────────────────────────────────

/// The written state of one series: sorted label pairs plus its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Const and variable labels, sorted by name.
    pub labels: Vec<LabelPair>,
    pub value: SampleValue,
    /// Explicit timestamp in milliseconds since the epoch, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,
}

impl Sample {
    pub fn new(labels: Vec<LabelPair>, value: SampleValue) -> Self {
        Self {
            labels,
            value,
            timestamp_ms: None,
        }
    }

    /// Value of the label with the given name.
    pub fn label_value(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|pair| pair.name == name)
            .map(|pair| pair.value.as_str())
    }
}

/// All gathered series sharing one metric name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub metric_type: MetricType,
    pub metrics: Vec<Sample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_reports_its_type() {
        assert_eq!(SampleValue::Counter(1.0).metric_type(), MetricType::Counter);
        assert_eq!(SampleValue::Untyped(1.0).metric_type(), MetricType::Untyped);
        let summary = SampleValue::Summary(SummaryValue {
            sample_count: 0,
            sample_sum: 0.0,
            quantiles: vec![],
        });
        assert_eq!(summary.metric_type(), MetricType::Summary);
        assert_eq!(summary.as_f64(), None);
        assert!(summary.as_summary().is_some());
    }

    #[test]
    fn sample_serializes_without_empty_timestamp() {
        let sample = Sample::new(
            vec![LabelPair::new("method", "GET")],
            SampleValue::Gauge(2.5),
        );
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(
            json,
            r#"{"labels":[{"name":"method","value":"GET"}],"value":{"gauge":2.5}}"#
        );
        assert_eq!(sample.label_value("method"), Some("GET"));
        assert_eq!(sample.label_value("code"), None);
    }

    #[test]
    fn metric_type_display() {
        assert_eq!(MetricType::Histogram.to_string(), "histogram");
    }
}
