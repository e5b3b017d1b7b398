//! tally — in-process metrics instrumentation.
//!
//! Application code creates typed metrics, updates them on the hot path,
//! and registers them with a [`Registry`]. An exposition layer later calls
//! [`Registry::gather`] for a sorted, validated snapshot.
//!
//! # Architecture
//!
//! ```text
//! tally-core       Desc, Metric, Collector, exposition records
//! tally-metrics    Counter, Gauge, Histogram, Summary, MetricVec, ...
//! tally-registry   Registry, Gatherer, Gathered
//! tally            default registry + SnapshotPublisher (tokio)
//! ```
//!
//! ```no_run
//! use std::sync::Arc;
//! use tally::{CounterVec, Opts};
//!
//! let requests = Arc::new(
//!     CounterVec::new(Opts::new("http_requests_total", "HTTP requests."), &["method"]).unwrap(),
//! );
//! tally::must_register(requests.clone());
//! requests.with_label_values(&["GET"]).inc();
//! let snapshot = tally::gather();
//! assert!(snapshot.is_complete());
//! ```

pub mod global;
pub mod publisher;

pub use global::{DefaultGatherer, default_registry, gather, must_register, register, unregister};
pub use publisher::SnapshotPublisher;

pub use tally_core::{
    Bucket, Collector, Desc, DescError, HistogramValue, LabelPair, Metric, MetricError,
    MetricFamily, MetricResult, MetricType, Quantile, Sample, SampleValue, SummaryValue,
    build_fq_name,
};
pub use tally_metrics::{
    ConstMetric, Counter, CounterFunc, CounterVec, Gauge, GaugeFunc, GaugeVec, Histogram,
    HistogramOpts, HistogramVec, MetricVec, Objective, Observer, Opts, Summary, SummaryOpts,
    SummaryVec, Timer, Untyped, UntypedFunc, UntypedVec, ValueFunc, ValueType,
    exponential_buckets, linear_buckets,
};
pub use tally_registry::{
    GatherError, GatherErrors, Gathered, Gatherer, RegistrationError, Registry, RegistryConfig,
};
