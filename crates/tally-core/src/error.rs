//! Error types for descriptors and metrics.

use thiserror::Error;

/// Result type alias for descriptor construction.
pub type DescResult<T> = Result<T, DescError>;

/// Result type alias for metric construction and writing.
pub type MetricResult<T> = Result<T, MetricError>;

/// Errors detected while validating a descriptor.
///
/// Always raised synchronously by [`Desc::new`](crate::Desc::new); a
/// descriptor that exists is a valid descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescError {
    #[error("invalid metric name: {0:?}")]
    InvalidMetricName(String),

    #[error("invalid label name: {0:?}")]
    InvalidLabelName(String),

    #[error("label name {0:?} is reserved (names starting with \"__\" are internal)")]
    ReservedLabelName(String),

    #[error("empty help string for metric {0:?}")]
    EmptyHelp(String),

    #[error("duplicate variable label name {0:?}")]
    DuplicateLabelName(String),

    #[error("variable label name {0:?} collides with a const label")]
    ConstLabelCollision(String),
}

/// Errors raised while building, updating, or writing a metric.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    #[error(transparent)]
    Desc(#[from] DescError),

    #[error("{fq_name}: expected {expected} label values, got {got}")]
    LabelCardinality {
        fq_name: String,
        expected: usize,
        got: usize,
    },

    #[error("{fq_name}: missing value for label {label:?}")]
    MissingLabel { fq_name: String, label: String },

    #[error("label {label:?} is reserved for {kind} metrics")]
    ReservedLabel { label: String, kind: &'static str },

    #[error("counter cannot decrease in value (got {0})")]
    NegativeIncrement(f64),

    #[error("invalid histogram buckets: {0}")]
    InvalidBuckets(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("{0}")]
    Custom(String),
}
