//! tally-core — the data model shared by every tally crate.
//!
//! Defines metric descriptors, the exposition records a metric writes, and
//! the two capability traits everything else is built on.
//!
//! # Architecture
//!
//! ```text
//! Desc            ← immutable family identity (id, dim_hash)
//!   └── Metric    ← one series: desc + label values + value → write() → Sample
//! Collector       ← describe() → [Desc], collect(sink) → pushes &dyn Metric
//!
//! MetricFamily    ← gathered grouping of Samples sharing one name
//! ```
//!
//! Concrete metrics live in `tally-metrics`; the registry that validates
//! and gathers collectors lives in `tally-registry`.

pub mod desc;
pub mod error;
pub mod hash;
pub mod metric;
pub mod record;

pub use desc::{Desc, build_fq_name, is_valid_label_name, is_valid_metric_name};
pub use error::{DescError, DescResult, MetricError, MetricResult};
pub use metric::{Collector, Metric, collect_samples};
pub use record::{
    Bucket, HistogramValue, LabelPair, MetricFamily, MetricType, Quantile, Sample, SampleValue,
    SummaryValue,
};
