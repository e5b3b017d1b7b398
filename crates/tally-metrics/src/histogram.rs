//! Lock-free cumulative histogram.
//!
//! ```text
//! bounds:  [  1  ,  5  , 10  ]
//! counts:  [ c0  , c1  , c2  , overflow ]   per-bucket, non-cumulative
//! write:   [ c0  , c0+c1, c0+c1+c2 ]        cumulative, +Inf = count
//! ```
//!
//! `observe` touches one bucket counter, the sum, and the count, each with
//! its own atomic operation. A concurrent `write` may therefore see a sum or
//! count that is one observation ahead of or behind the buckets; the
//! histogram never takes a lock to close that gap.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tally_core::{
    Bucket, Desc, HistogramValue, LabelPair, Metric, MetricError, MetricResult, Sample,
    SampleValue,
};

use crate::atomic::AtomicF64;
use crate::opts::HistogramOpts;
use crate::timer::Observer;

/// Label name carrying the bucket bound in exposition formats.
pub const BUCKET_LABEL: &str = "le";

/// Fail if `label` appears among the descriptor's const or variable labels.
pub(crate) fn reject_reserved_label(
    desc: &Desc,
    label: &str,
    kind: &'static str,
) -> MetricResult<()> {
    let in_variable = desc.variable_labels().iter().any(|name| name == label);
    let in_const = desc.const_label_pairs().iter().any(|pair| pair.name == label);
    if in_variable || in_const {
        return Err(MetricError::ReservedLabel {
            label: label.to_string(),
            kind,
        });
    }
    Ok(())
}

/// Counts observations into configurable buckets.
#[derive(Debug)]
pub struct Histogram {
    desc: Desc,
    labels: Vec<LabelPair>,
    upper_bounds: Arc<[f64]>,
    /// One slot per bound plus the overflow slot.
    counts: Box<[AtomicU64]>,
    sum: AtomicF64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(opts: HistogramOpts) -> MetricResult<Self> {
        let buckets = opts.resolved_buckets()?;
        let desc = opts.common.desc(&[])?;
        Self::with_desc(desc, buckets.into(), &[])
    }

    /// Build one series. `upper_bounds` must already be validated.
    pub(crate) fn with_desc(
        desc: Desc,
        upper_bounds: Arc<[f64]>,
        label_values: &[&str],
    ) -> MetricResult<Self> {
        reject_reserved_label(&desc, BUCKET_LABEL, "histogram")?;
        let labels = desc.label_pairs(label_values)?;
        let counts = (0..=upper_bounds.len()).map(|_| AtomicU64::new(0)).collect();
        Ok(Self {
            desc,
            labels,
            upper_bounds,
            counts,
            sum: AtomicF64::default(),
            count: AtomicU64::new(0),
        })
    }

    /// Record one observation.
    pub fn observe(&self, value: f64) {
        let index = if value.is_nan() {
            self.upper_bounds.len()
        } else {
            self.upper_bounds.partition_point(|bound| *bound < value)
        };
        self.counts[index].fetch_add(1, Ordering::Relaxed);
        self.sum.add(value);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Finite bucket upper bounds, ascending.
    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper_bounds
    }

    pub fn sample_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sample_sum(&self) -> f64 {
        self.sum.get()
    }
}

impl Observer for Histogram {
    fn observe(&self, value: f64) {
        Histogram::observe(self, value);
    }
}

impl Metric for Histogram {
    fn desc(&self) -> &Desc {
        &self.desc
    }

    fn write(&self) -> MetricResult<Sample> {
        let mut cumulative = 0;
        let buckets = self
            .upper_bounds
            .iter()
            .zip(self.counts.iter())
            .map(|(&upper_bound, slot)| {
                cumulative += slot.load(Ordering::Relaxed);
                Bucket {
                    upper_bound,
                    cumulative_count: cumulative,
                }
            })
            .collect();
        Ok(Sample::new(
            self.labels.clone(),
            SampleValue::Histogram(HistogramValue {
                sample_count: self.count.load(Ordering::Relaxed),
                sample_sum: self.sum.get(),
                buckets,
            }),
        ))
    }
}

self_collecting!(Histogram);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opts::Opts;

    fn histogram(buckets: Vec<f64>) -> Histogram {
        Histogram::new(HistogramOpts::new("latency_seconds", "Latency.").buckets(buckets)).unwrap()
    }

    fn cumulative(h: &Histogram) -> Vec<u64> {
        let sample = h.write().unwrap();
        sample
            .value
            .as_histogram()
            .unwrap()
            .buckets
            .iter()
            .map(|b| b.cumulative_count)
            .collect()
    }

    #[test]
    fn values_on_a_bound_land_in_that_bucket() {
        let h = histogram(vec![1.0, 5.0, 10.0]);
        h.observe(1.0);
        h.observe(5.0);
        h.observe(10.0);
        assert_eq!(cumulative(&h), vec![1, 2, 3]);
    }

    #[test]
    fn overflow_only_shows_in_count() {
        let h = histogram(vec![1.0]);
        h.observe(100.0);
        h.observe(f64::NAN);
        assert_eq!(cumulative(&h), vec![0]);
        assert_eq!(h.sample_count(), 2);
    }

    #[test]
    fn default_buckets_apply() {
        let h = Histogram::new(HistogramOpts::new("latency_seconds", "Latency.")).unwrap();
        assert_eq!(h.upper_bounds().len(), 11);
        assert_eq!(h.upper_bounds()[0], 0.005);
    }

    #[test]
    fn rejects_le_label() {
        let opts: HistogramOpts = Opts::new("latency_seconds", "Latency.")
            .const_label("le", "1")
            .into();
        let err = Histogram::new(opts).unwrap_err();
        assert_eq!(
            err,
            MetricError::ReservedLabel {
                label: "le".into(),
                kind: "histogram"
            }
        );
    }

    #[test]
    fn rejects_unsorted_buckets() {
        let opts = HistogramOpts::new("latency_seconds", "Latency.").buckets(vec![2.0, 1.0]);
        assert!(matches!(
            Histogram::new(opts),
            Err(MetricError::InvalidBuckets(_))
        ));
    }
}
