//! Throw-away metrics with a fixed value.
//!
//! Custom collectors that mirror state owned elsewhere (a connection pool,
//! a foreign library's counters) build a [`ConstMetric`] per series inside
//! `collect` instead of keeping live metric objects around.

use tally_core::{
    Bucket, Desc, HistogramValue, LabelPair, Metric, MetricResult, Quantile, Sample, SampleValue,
    SummaryValue,
};

use crate::histogram::{BUCKET_LABEL, reject_reserved_label};
use crate::summary::QUANTILE_LABEL;
use crate::value::ValueType;

/// A metric whose value was fixed at construction.
#[derive(Debug, Clone)]
pub struct ConstMetric {
    desc: Desc,
    labels: Vec<LabelPair>,
    value: SampleValue,
    timestamp_ms: Option<i64>,
}

impl ConstMetric {
    pub fn new(
        desc: Desc,
        value_type: ValueType,
        value: f64,
        label_values: &[&str],
    ) -> MetricResult<Self> {
        let labels = desc.label_pairs(label_values)?;
        Ok(Self {
            desc,
            labels,
            value: value_type.sample_value(value),
            timestamp_ms: None,
        })
    }

    /// Like [`ConstMetric::new`] but panics on invalid label values.
    ///
    /// # Panics
    ///
    /// Panics if the number of label values does not match the descriptor.
    pub fn must_new(desc: Desc, value_type: ValueType, value: f64, label_values: &[&str]) -> Self {
        match Self::new(desc, value_type, value, label_values) {
            Ok(metric) => metric,
            Err(e) => panic!("invalid const metric: {e}"),
        }
    }

    /// A fixed histogram. `buckets` hold cumulative counts and may come in
    /// any order; a `+Inf` bucket is dropped since `count` already covers it.
    pub fn histogram(
        desc: Desc,
        count: u64,
        sum: f64,
        mut buckets: Vec<Bucket>,
        label_values: &[&str],
    ) -> MetricResult<Self> {
        reject_reserved_label(&desc, BUCKET_LABEL, "histogram")?;
        let labels = desc.label_pairs(label_values)?;
        buckets.retain(|bucket| bucket.upper_bound != f64::INFINITY);
        buckets.sort_by(|a, b| a.upper_bound.total_cmp(&b.upper_bound));
        Ok(Self {
            desc,
            labels,
            value: SampleValue::Histogram(HistogramValue {
                sample_count: count,
                sample_sum: sum,
                buckets,
            }),
            timestamp_ms: None,
        })
    }

    /// A fixed summary with precomputed quantiles.
    pub fn summary(
        desc: Desc,
        count: u64,
        sum: f64,
        mut quantiles: Vec<Quantile>,
        label_values: &[&str],
    ) -> MetricResult<Self> {
        reject_reserved_label(&desc, QUANTILE_LABEL, "summary")?;
        let labels = desc.label_pairs(label_values)?;
        quantiles.sort_by(|a, b| a.quantile.total_cmp(&b.quantile));
        Ok(Self {
            desc,
            labels,
            value: SampleValue::Summary(SummaryValue {
                sample_count: count,
                sample_sum: sum,
                quantiles,
            }),
            timestamp_ms: None,
        })
    }

    /// Attach an explicit timestamp, in milliseconds since the Unix epoch.
    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }
}

impl Metric for ConstMetric {
    fn desc(&self) -> &Desc {
        &self.desc
    }

    fn write(&self) -> MetricResult<Sample> {
        Ok(Sample {
            labels: self.labels.clone(),
            value: self.value.clone(),
            timestamp_ms: self.timestamp_ms,
        })
    }
}

self_collecting!(ConstMetric);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tally_core::MetricError;

    fn desc(labels: &[&str]) -> Desc {
        Desc::new("pool_connections", "Open pool connections.", labels, &HashMap::new()).unwrap()
    }

    #[test]
    fn scalar_const_metric() {
        let metric = ConstMetric::new(desc(&["pool"]), ValueType::Gauge, 12.0, &["primary"])
            .unwrap()
            .with_timestamp(1_700_000_000_000);
        let sample = metric.write().unwrap();
        assert_eq!(sample.value, SampleValue::Gauge(12.0));
        assert_eq!(sample.label_value("pool"), Some("primary"));
        assert_eq!(sample.timestamp_ms, Some(1_700_000_000_000));
    }

    #[test]
    fn wrong_label_count_is_an_error() {
        let err = ConstMetric::new(desc(&["pool"]), ValueType::Counter, 1.0, &[]).unwrap_err();
        assert!(matches!(err, MetricError::LabelCardinality { expected: 1, got: 0, .. }));
    }

    #[test]
    #[should_panic(expected = "invalid const metric")]
    fn must_new_panics() {
        ConstMetric::must_new(desc(&[]), ValueType::Counter, 1.0, &["extra"]);
    }

    #[test]
    fn const_histogram_sorts_buckets_and_drops_inf() {
        let buckets = vec![
            Bucket { upper_bound: f64::INFINITY, cumulative_count: 9 },
            Bucket { upper_bound: 5.0, cumulative_count: 7 },
            Bucket { upper_bound: 1.0, cumulative_count: 2 },
        ];
        let metric = ConstMetric::histogram(desc(&[]), 9, 31.5, buckets, &[]).unwrap();
        let sample = metric.write().unwrap();
        let hist = sample.value.as_histogram().unwrap();
        assert_eq!(hist.sample_count, 9);
        let bounds: Vec<f64> = hist.buckets.iter().map(|b| b.upper_bound).collect();
        assert_eq!(bounds, vec![1.0, 5.0]);
    }

    #[test]
    fn const_histogram_rejects_le_label() {
        let err = ConstMetric::histogram(desc(&["le"]), 0, 0.0, vec![], &["1"]).unwrap_err();
        assert!(matches!(err, MetricError::ReservedLabel { .. }));
    }

    #[test]
    fn const_summary() {
        let quantiles = vec![
            Quantile { quantile: 0.9, value: 8.0 },
            Quantile { quantile: 0.5, value: 3.0 },
        ];
        let metric = ConstMetric::summary(desc(&[]), 4, 20.0, quantiles, &[]).unwrap();
        let sample = metric.write().unwrap();
        let summary = sample.value.as_summary().unwrap();
        assert_eq!(summary.quantiles[0].quantile, 0.5);
        assert_eq!(summary.sample_sum, 20.0);
    }
}
