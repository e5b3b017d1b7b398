//! Streaming quantile summary over a sliding time window.
//!
//! ```text
//! max_age = 10m, age_buckets = 5  →  five 2m windows in a ring
//!
//!   [ w0 ][ w1 ][ w2 ][ w3 ][ w4 ]
//!           ▲ head: receives observations until its slot expires,
//!             then the oldest window is cleared and becomes head
//! ```
//!
//! Rotation is lazy: every `observe` and `write` first advances the ring
//! to the current time. `write` merges all windows and answers each
//! objective from the merged stream. Count and sum are cumulative since
//! creation and never decay.
//!
//! Unlike [`Histogram`](crate::Histogram), a summary serializes
//! observations on one mutex per instance: the quantile stream is a
//! mutable ordered structure that atomics cannot update.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tally_core::{
    Desc, LabelPair, Metric, MetricResult, Quantile, Sample, SampleValue, SummaryValue,
};

use crate::histogram::reject_reserved_label;
use crate::opts::{SummaryConfig, SummaryOpts};
use crate::quantile::Stream;
use crate::timer::Observer;

/// Label name carrying the quantile in exposition formats.
pub const QUANTILE_LABEL: &str = "quantile";

/// Estimates configured quantiles of recent observations.
#[derive(Debug)]
pub struct Summary {
    desc: Desc,
    labels: Vec<LabelPair>,
    config: Arc<SummaryConfig>,
    slot: Duration,
    state: Mutex<SummaryState>,
}

#[derive(Debug)]
struct SummaryState {
    windows: Vec<Stream>,
    head: usize,
    head_expires: Instant,
    count: u64,
    sum: f64,
}

impl SummaryState {
    /// Advance the ring so that `head` covers `now`.
    fn rotate(&mut self, now: Instant, slot: Duration) {
        if now < self.head_expires {
            return;
        }
        let elapsed = now.duration_since(self.head_expires).as_nanos();
        let expired = 1 + elapsed / slot.as_nanos();

        if expired >= self.windows.len() as u128 {
            for window in &mut self.windows {
                window.reset();
            }
            self.head = 0;
            self.head_expires = now + slot;
            return;
        }
        for _ in 0..expired {
            self.head = (self.head + 1) % self.windows.len();
            self.windows[self.head].reset();
            self.head_expires += slot;
        }
    }
}

impl Summary {
    pub fn new(opts: SummaryOpts) -> MetricResult<Self> {
        let config = opts.resolve()?;
        let desc = opts.common.desc(&[])?;
        Self::with_desc(desc, Arc::new(config), &[])
    }

    pub(crate) fn with_desc(
        desc: Desc,
        config: Arc<SummaryConfig>,
        label_values: &[&str],
    ) -> MetricResult<Self> {
        reject_reserved_label(&desc, QUANTILE_LABEL, "summary")?;
        let labels = desc.label_pairs(label_values)?;
        let slot = (config.max_age / config.age_buckets).max(Duration::from_nanos(1));
        let windows = (0..config.age_buckets)
            .map(|_| Stream::new(&config.objectives, config.buf_cap))
            .collect();
        Ok(Self {
            desc,
            labels,
            slot,
            state: Mutex::new(SummaryState {
                windows,
                head: 0,
                head_expires: Instant::now() + slot,
                count: 0,
                sum: 0.0,
            }),
            config,
        })
    }

    /// Record one observation.
    pub fn observe(&self, value: f64) {
        self.observe_at(value, Instant::now());
    }

    fn observe_at(&self, value: f64, now: Instant) {
        let mut state = self.state.lock();
        state.rotate(now, self.slot);
        let head = state.head;
        state.windows[head].insert(value);
        state.count += 1;
        state.sum += value;
    }

    fn write_at(&self, now: Instant) -> Sample {
        let mut state = self.state.lock();
        state.rotate(now, self.slot);
        for window in &mut state.windows {
            window.flush();
        }
        let merged = Stream::merged(&self.config.objectives, self.config.buf_cap, &state.windows);
        let quantiles = self
            .config
            .objectives
            .iter()
            .map(|objective| Quantile {
                quantile: objective.quantile,
                value: merged.query(objective.quantile),
            })
            .collect();
        Sample::new(
            self.labels.clone(),
            SampleValue::Summary(SummaryValue {
                sample_count: state.count,
                sample_sum: state.sum,
                quantiles,
            }),
        )
    }

    /// Observations received since creation.
    pub fn sample_count(&self) -> u64 {
        self.state.lock().count
    }

    /// Sum of observations received since creation.
    pub fn sample_sum(&self) -> f64 {
        self.state.lock().sum
    }
}

impl Observer for Summary {
    fn observe(&self, value: f64) {
        Summary::observe(self, value);
    }
}

impl Metric for Summary {
    fn desc(&self) -> &Desc {
        &self.desc
    }

    fn write(&self) -> MetricResult<Sample> {
        Ok(self.write_at(Instant::now()))
    }
}

self_collecting!(Summary);
