//! tally-metrics — the concrete metric kinds.
//!
//! Every metric here is both a [`Metric`](tally_core::Metric) (it writes one
//! series) and a [`Collector`](tally_core::Collector) (it describes and
//! emits itself), so bare metrics register directly with a registry.
//!
//! # Architecture
//!
//! ```text
//! Opts / HistogramOpts / SummaryOpts   ← serde-deserializable definitions
//!   │
//!   ├── Counter, Gauge, Untyped        ← lock-free f64 cell
//!   ├── ValueFunc, ConstMetric         ← values computed at collect time
//!   ├── Histogram                      ← per-bucket atomics, cumulative on write
//!   ├── Summary                        ← mutex + rotating quantile streams
//!   │
//!   └── MetricVec<M>                   ← label values → Arc<M>, sharded map
//!         CounterVec, GaugeVec, UntypedVec, HistogramVec, SummaryVec
//!
//! Timer ── observes elapsed seconds into any Observer (Histogram, Summary)
//! ```

/// Implement `Collector` for metrics that collect themselves.
macro_rules! self_collecting {
    ($($metric:ty),+ $(,)?) => {
        $(
            impl ::tally_core::Collector for $metric {
                fn describe(&self) -> Vec<::tally_core::Desc> {
                    vec![::tally_core::Metric::desc(self).clone()]
                }

                fn collect(&self, sink: &mut dyn FnMut(&dyn ::tally_core::Metric)) {
                    sink(self);
                }
            }
        )+
    };
}

mod atomic;
pub mod constant;
pub mod histogram;
pub mod opts;
mod quantile;
pub mod summary;
pub mod timer;
pub mod value;
pub mod vec;

pub use constant::ConstMetric;
pub use histogram::{BUCKET_LABEL, Histogram};
pub use opts::{
    DEFAULT_AGE_BUCKETS, DEFAULT_BUCKETS, DEFAULT_BUF_CAP, DEFAULT_MAX_AGE, DEFAULT_OBJECTIVES,
    HistogramOpts, Objective, Opts, SummaryConfig, SummaryOpts, exponential_buckets,
    linear_buckets, parse_duration,
};
pub use summary::{QUANTILE_LABEL, Summary};
pub use timer::{Observer, Timer};
pub use value::{Counter, CounterFunc, Gauge, GaugeFunc, Untyped, UntypedFunc, ValueFunc, ValueType};
pub use vec::{CounterVec, GaugeVec, HistogramVec, MetricVec, SummaryVec, UntypedVec};
