//! Label-partitioned metric families.
//!
//! A [`MetricVec`] holds one metric per distinct tuple of variable label
//! values, created on first use. Children are indexed by the hash of the
//! value tuple in a sharded concurrent map; each slot keeps every tuple that
//! landed on that hash and compares values exactly, so collisions resolve to
//! distinct children.
//!
//! Callers get an `Arc<M>` back. Holding on to it and updating it directly
//! skips the lookup entirely on hot paths.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tally_core::hash::hash_parts;
use tally_core::{Collector, Desc, Metric, MetricError, MetricResult};
use tracing::debug;

use crate::histogram::{BUCKET_LABEL, Histogram, reject_reserved_label};
use crate::opts::{HistogramOpts, Opts, SummaryOpts};
use crate::summary::{QUANTILE_LABEL, Summary};
use crate::value::{Counter, Gauge, Untyped};

type NewMetricFn<M> = Box<dyn Fn(Desc, &[&str]) -> MetricResult<M> + Send + Sync>;

struct Child<M> {
    label_values: Vec<String>,
    metric: Arc<M>,
}

impl<M> Child<M> {
    fn matches(&self, values: &[&str]) -> bool {
        self.label_values.len() == values.len()
            && self.label_values.iter().zip(values).all(|(a, b)| a == b)
    }
}

/// A family of same-kind metrics partitioned by variable label values.
pub struct MetricVec<M> {
    desc: Desc,
    children: DashMap<u64, Vec<Child<M>>>,
    new_metric: NewMetricFn<M>,
}

impl<M: Metric> MetricVec<M> {
    /// Build a vector whose children are created by `new_metric`.
    ///
    /// `new_metric` receives the shared descriptor and the label values of
    /// the child being created.
    pub fn with_factory(
        desc: Desc,
        new_metric: impl Fn(Desc, &[&str]) -> MetricResult<M> + Send + Sync + 'static,
    ) -> Self {
        Self {
            desc,
            children: DashMap::new(),
            new_metric: Box::new(new_metric),
        }
    }

    pub fn desc(&self) -> &Desc {
        &self.desc
    }

    /// Get the child for `values`, creating it on first use.
    ///
    /// Values are given in the order of the descriptor's variable labels.
    pub fn get_metric_with_label_values(&self, values: &[&str]) -> MetricResult<Arc<M>> {
        self.check_cardinality(values.len())?;
        self.get_or_create(hash_parts(values.iter().copied()), values)
    }

    /// Like [`MetricVec::get_metric_with_label_values`] but panics on error.
    ///
    /// # Panics
    ///
    /// Panics if the number of values does not match the variable labels.
    pub fn with_label_values(&self, values: &[&str]) -> Arc<M> {
        match self.get_metric_with_label_values(values) {
            Ok(metric) => metric,
            Err(e) => panic!("{e}"),
        }
    }

    /// Get the child for a label map, creating it on first use.
    pub fn get_metric_with(&self, labels: &HashMap<String, String>) -> MetricResult<Arc<M>> {
        let values = self.values_from_map(labels)?;
        self.get_metric_with_label_values(&values)
    }

    /// Like [`MetricVec::get_metric_with`] but panics on error.
    ///
    /// # Panics
    ///
    /// Panics if `labels` does not name exactly the variable labels.
    pub fn with(&self, labels: &HashMap<String, String>) -> Arc<M> {
        match self.get_metric_with(labels) {
            Ok(metric) => metric,
            Err(e) => panic!("{e}"),
        }
    }

    /// Remove the child for `values`. Returns whether it existed.
    ///
    /// `Arc`s handed out earlier stay usable but are no longer collected.
    pub fn delete_label_values(&self, values: &[&str]) -> bool {
        if self.check_cardinality(values.len()).is_err() {
            return false;
        }
        self.delete_hashed(hash_parts(values.iter().copied()), values)
    }

    /// Remove the child for a label map. Returns whether it existed.
    pub fn delete(&self, labels: &HashMap<String, String>) -> bool {
        match self.values_from_map(labels) {
            Ok(values) => self.delete_label_values(&values),
            Err(_) => false,
        }
    }

    /// Remove every child.
    pub fn reset(&self) {
        self.children.clear();
        debug!(fq_name = %self.desc.fq_name(), "reset metric vector");
    }

    /// Number of live children.
    pub fn len(&self) -> usize {
        self.children.iter().map(|slot| slot.value().len()).sum()
    }

    /// Whether no child is live. Slots emptied by a concurrent delete
    /// count as empty before they are removed.
    pub fn is_empty(&self) -> bool {
        self.children.iter().all(|slot| slot.value().is_empty())
    }

    // ── Internals ──────────────────────────────────────────────────

    fn check_cardinality(&self, got: usize) -> MetricResult<()> {
        let expected = self.desc.variable_labels().len();
        if got != expected {
            return Err(MetricError::LabelCardinality {
                fq_name: self.desc.fq_name().to_string(),
                expected,
                got,
            });
        }
        Ok(())
    }

    fn values_from_map<'a>(&self, labels: &'a HashMap<String, String>) -> MetricResult<Vec<&'a str>> {
        self.check_cardinality(labels.len())?;
        self.desc
            .variable_labels()
            .iter()
            .map(|name| {
                labels
                    .get(name)
                    .map(String::as_str)
                    .ok_or_else(|| MetricError::MissingLabel {
                        fq_name: self.desc.fq_name().to_string(),
                        label: name.clone(),
                    })
            })
            .collect()
    }

    fn get_or_create(&self, hash: u64, values: &[&str]) -> MetricResult<Arc<M>> {
        if let Some(slot) = self.children.get(&hash) {
            if let Some(child) = slot.iter().find(|child| child.matches(values)) {
                return Ok(Arc::clone(&child.metric));
            }
        }

        // Built outside the shard lock; a racing creator may win the insert.
        let metric = Arc::new((self.new_metric)(self.desc.clone(), values)?);

        let mut slot = self.children.entry(hash).or_default();
        if let Some(child) = slot.iter().find(|child| child.matches(values)) {
            return Ok(Arc::clone(&child.metric));
        }
        slot.push(Child {
            label_values: values.iter().map(|v| v.to_string()).collect(),
            metric: Arc::clone(&metric),
        });
        debug!(fq_name = %self.desc.fq_name(), labels = ?values, "created vector child");
        Ok(metric)
    }

    fn delete_hashed(&self, hash: u64, values: &[&str]) -> bool {
        let (removed, now_empty) = match self.children.get_mut(&hash) {
            Some(mut slot) => {
                let before = slot.len();
                slot.retain(|child| !child.matches(values));
                (slot.len() != before, slot.is_empty())
            }
            None => return false,
        };
        if now_empty {
            self.children.remove_if(&hash, |_, slot| slot.is_empty());
        }
        if removed {
            debug!(fq_name = %self.desc.fq_name(), labels = ?values, "deleted vector child");
        }
        removed
    }
}

impl<M: Metric + 'static> Collector for MetricVec<M> {
    fn describe(&self) -> Vec<Desc> {
        vec![self.desc.clone()]
    }

    fn collect(&self, sink: &mut dyn FnMut(&dyn Metric)) {
        // Snapshot first so no shard lock is held while the sink runs.
        let metrics: Vec<Arc<M>> = self
            .children
            .iter()
            .flat_map(|slot| {
                slot.value()
                    .iter()
                    .map(|child| Arc::clone(&child.metric))
                    .collect::<Vec<_>>()
            })
            .collect();
        for metric in &metrics {
            sink(&**metric);
        }
    }
}

impl<M> std::fmt::Debug for MetricVec<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricVec")
            .field("desc", &self.desc)
            .field("slots", &self.children.len())
            .finish_non_exhaustive()
    }
}

// ── Typed vectors ──────────────────────────────────────────────────

pub type CounterVec = MetricVec<Counter>;
pub type GaugeVec = MetricVec<Gauge>;
pub type UntypedVec = MetricVec<Untyped>;
pub type HistogramVec = MetricVec<Histogram>;
pub type SummaryVec = MetricVec<Summary>;

impl MetricVec<Counter> {
    pub fn new(opts: Opts, label_names: &[&str]) -> MetricResult<Self> {
        Ok(Self::with_factory(opts.desc(label_names)?, |desc, values| {
            Counter::with_desc(desc, values)
        }))
    }
}

impl MetricVec<Gauge> {
    pub fn new(opts: Opts, label_names: &[&str]) -> MetricResult<Self> {
        Ok(Self::with_factory(opts.desc(label_names)?, |desc, values| {
            Gauge::with_desc(desc, values)
        }))
    }
}

impl MetricVec<Untyped> {
    pub fn new(opts: Opts, label_names: &[&str]) -> MetricResult<Self> {
        Ok(Self::with_factory(opts.desc(label_names)?, |desc, values| {
            Untyped::with_desc(desc, values)
        }))
    }
}

impl MetricVec<Histogram> {
    pub fn new(opts: HistogramOpts, label_names: &[&str]) -> MetricResult<Self> {
        let upper_bounds: Arc<[f64]> = opts.resolved_buckets()?.into();
        let desc = opts.common.desc(label_names)?;
        reject_reserved_label(&desc, BUCKET_LABEL, "histogram")?;
        Ok(Self::with_factory(desc, move |desc, values| {
            Histogram::with_desc(desc, Arc::clone(&upper_bounds), values)
        }))
    }
}

impl MetricVec<Summary> {
    pub fn new(opts: SummaryOpts, label_names: &[&str]) -> MetricResult<Self> {
        let config = Arc::new(opts.resolve()?);
        let desc = opts.common.desc(label_names)?;
        reject_reserved_label(&desc, QUANTILE_LABEL, "summary")?;
        Ok(Self::with_factory(desc, move |desc, values| {
            Summary::with_desc(desc, Arc::clone(&config), values)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{SampleValue, collect_samples};

    fn requests() -> CounterVec {
        CounterVec::new(Opts::new("requests_total", "Requests."), &["method", "code"]).unwrap()
    }

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn same_values_return_same_child() {
        let vec = requests();
        let a = vec.with_label_values(&["GET", "200"]);
        let b = vec.with_label_values(&["GET", "200"]);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(vec.len(), 1);
    }

    #[test]
    fn label_map_resolves_in_declaration_order() {
        let vec = requests();
        let by_values = vec.with_label_values(&["POST", "500"]);
        let by_map = vec.with(&map(&[("code", "500"), ("method", "POST")]));
        assert!(Arc::ptr_eq(&by_values, &by_map));
    }

    #[test]
    fn label_errors() {
        let vec = requests();
        assert!(matches!(
            vec.get_metric_with_label_values(&["GET"]),
            Err(MetricError::LabelCardinality { expected: 2, got: 1, .. })
        ));
        assert!(matches!(
            vec.get_metric_with(&map(&[("method", "GET"), ("status", "200")])),
            Err(MetricError::MissingLabel { .. })
        ));
        assert!(vec.is_empty());
    }

    #[test]
    fn colliding_hashes_keep_distinct_children() {
        let vec = requests();
        let a = vec.get_or_create(42, &["GET", "200"]).unwrap();
        let b = vec.get_or_create(42, &["PUT", "201"]).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &vec.get_or_create(42, &["GET", "200"]).unwrap()));
        assert_eq!(vec.len(), 2);

        assert!(vec.delete_hashed(42, &["GET", "200"]));
        assert_eq!(vec.len(), 1);
        assert!(vec.delete_hashed(42, &["PUT", "201"]));
        assert!(vec.is_empty());
    }

    #[test]
    fn emptied_slot_counts_as_empty() {
        let vec = requests();
        // State between a delete emptying a slot and the slot's removal.
        vec.children.insert(7, Vec::new());
        assert_eq!(vec.len(), 0);
        assert!(vec.is_empty());

        vec.with_label_values(&["GET", "200"]);
        assert!(!vec.is_empty());
    }

    #[test]
    fn delete_and_reset() {
        let vec = requests();
        vec.with_label_values(&["GET", "200"]).inc();
        vec.with_label_values(&["GET", "404"]).inc();
        assert!(vec.delete_label_values(&["GET", "404"]));
        assert!(!vec.delete_label_values(&["GET", "404"]));
        assert!(!vec.delete_label_values(&["GET"]));
        assert!(vec.delete(&map(&[("method", "GET"), ("code", "200")])));
        assert!(vec.is_empty());

        vec.with_label_values(&["GET", "200"]);
        vec.reset();
        assert_eq!(vec.len(), 0);
    }

    #[test]
    fn collect_emits_every_child() {
        let vec = requests();
        vec.with_label_values(&["GET", "200"]).inc_by(3.0);
        vec.with_label_values(&["POST", "201"]).inc();
        let mut samples: Vec<_> = collect_samples(&vec)
            .into_iter()
            .map(Result::unwrap)
            .collect();
        samples.sort_by(|a, b| a.labels.cmp(&b.labels));
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].value, SampleValue::Counter(3.0));
        assert_eq!(samples[0].label_value("method"), Some("GET"));
    }

    #[test]
    fn histogram_vec_rejects_le() {
        let err = HistogramVec::new(HistogramOpts::new("latency_seconds", "Latency."), &["le"])
            .unwrap_err();
        assert!(matches!(err, MetricError::ReservedLabel { .. }));
    }

    #[test]
    fn summary_vec_shares_config() {
        let vec = SummaryVec::new(SummaryOpts::new("rpc_seconds", "RPC latency."), &["service"])
            .unwrap();
        vec.with_label_values(&["auth"]).observe(1.0);
        vec.with_label_values(&["billing"]).observe(2.0);
        assert_eq!(vec.len(), 2);
        assert_eq!(vec.with_label_values(&["auth"]).sample_count(), 1);
    }
}
