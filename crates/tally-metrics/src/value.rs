//! Scalar metrics: counters, gauges, untyped values, and value functions.
//!
//! All three scalar kinds share one lock-free cell; they differ only in the
//! operations they expose and in the type tag they write.

use std::time::{SystemTime, UNIX_EPOCH};

use tally_core::{Desc, LabelPair, Metric, MetricError, MetricResult, Sample, SampleValue};

use crate::atomic::AtomicF64;
use crate::opts::Opts;

/// Type tag for scalar values built from callbacks or constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Counter,
    Gauge,
    Untyped,
}

impl ValueType {
    pub(crate) fn sample_value(self, value: f64) -> SampleValue {
        match self {
            ValueType::Counter => SampleValue::Counter(value),
            ValueType::Gauge => SampleValue::Gauge(value),
            ValueType::Untyped => SampleValue::Untyped(value),
        }
    }
}

/// Descriptor, label pairs, and value cell of one scalar series.
#[derive(Debug)]
struct Scalar {
    desc: Desc,
    labels: Vec<LabelPair>,
    value: AtomicF64,
}

impl Scalar {
    fn new(desc: Desc, label_values: &[&str]) -> MetricResult<Self> {
        let labels = desc.label_pairs(label_values)?;
        Ok(Self {
            desc,
            labels,
            value: AtomicF64::new(0.0),
        })
    }

    fn sample(&self, value_type: ValueType) -> Sample {
        Sample::new(self.labels.clone(), value_type.sample_value(self.value.get()))
    }
}

// ── Counter ────────────────────────────────────────────────────────

/// A monotonically increasing value.
#[derive(Debug)]
pub struct Counter {
    inner: Scalar,
}

impl Counter {
    pub fn new(opts: Opts) -> MetricResult<Self> {
        Self::with_desc(opts.desc(&[])?, &[])
    }

    /// Build one series of `desc` with the given variable label values.
    pub fn with_desc(desc: Desc, label_values: &[&str]) -> MetricResult<Self> {
        Ok(Self {
            inner: Scalar::new(desc, label_values)?,
        })
    }

    pub fn inc(&self) {
        self.inner.value.add(1.0);
    }

    /// Add `value` to the counter.
    ///
    /// # Panics
    ///
    /// Panics if `value` is negative; use [`Counter::try_inc_by`] to get an
    /// error instead.
    pub fn inc_by(&self, value: f64) {
        if let Err(e) = self.try_inc_by(value) {
            panic!("{e}");
        }
    }

    pub fn try_inc_by(&self, value: f64) -> MetricResult<()> {
        if value < 0.0 {
            return Err(MetricError::NegativeIncrement(value));
        }
        self.inner.value.add(value);
        Ok(())
    }

    pub fn get(&self) -> f64 {
        self.inner.value.get()
    }
}

impl Metric for Counter {
    fn desc(&self) -> &Desc {
        &self.inner.desc
    }

    fn write(&self) -> MetricResult<Sample> {
        Ok(self.inner.sample(ValueType::Counter))
    }
}

// ── Gauge ──────────────────────────────────────────────────────────

/// A value that can go up and down.
#[derive(Debug)]
pub struct Gauge {
    inner: Scalar,
}

impl Gauge {
    pub fn new(opts: Opts) -> MetricResult<Self> {
        Self::with_desc(opts.desc(&[])?, &[])
    }

    pub fn with_desc(desc: Desc, label_values: &[&str]) -> MetricResult<Self> {
        Ok(Self {
            inner: Scalar::new(desc, label_values)?,
        })
    }

    pub fn set(&self, value: f64) {
        self.inner.value.set(value);
    }

    pub fn inc(&self) {
        self.add(1.0);
    }

    pub fn dec(&self) {
        self.add(-1.0);
    }

    pub fn add(&self, value: f64) {
        self.inner.value.add(value);
    }

    pub fn sub(&self, value: f64) {
        self.add(-value);
    }

    /// Set the gauge to the current Unix time in seconds.
    pub fn set_to_current_time(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        self.set(now.as_secs_f64());
    }

    pub fn get(&self) -> f64 {
        self.inner.value.get()
    }
}

impl Metric for Gauge {
    fn desc(&self) -> &Desc {
        &self.inner.desc
    }

    fn write(&self) -> MetricResult<Sample> {
        Ok(self.inner.sample(ValueType::Gauge))
    }
}

// ── Untyped ────────────────────────────────────────────────────────

/// Gauge semantics without a type promise to the consumer.
#[derive(Debug)]
pub struct Untyped {
    inner: Scalar,
}

impl Untyped {
    pub fn new(opts: Opts) -> MetricResult<Self> {
        Self::with_desc(opts.desc(&[])?, &[])
    }

    pub fn with_desc(desc: Desc, label_values: &[&str]) -> MetricResult<Self> {
        Ok(Self {
            inner: Scalar::new(desc, label_values)?,
        })
    }

    pub fn set(&self, value: f64) {
        self.inner.value.set(value);
    }

    pub fn inc(&self) {
        self.add(1.0);
    }

    pub fn dec(&self) {
        self.add(-1.0);
    }

    pub fn add(&self, value: f64) {
        self.inner.value.add(value);
    }

    pub fn sub(&self, value: f64) {
        self.add(-value);
    }

    pub fn get(&self) -> f64 {
        self.inner.value.get()
    }
}

impl Metric for Untyped {
    fn desc(&self) -> &Desc {
        &self.inner.desc
    }

    fn write(&self) -> MetricResult<Sample> {
        Ok(self.inner.sample(ValueType::Untyped))
    }
}

// ── Value functions ────────────────────────────────────────────────

type ValueFn = Box<dyn Fn() -> f64 + Send + Sync>;

/// A scalar whose value is read from a callback at collection time.
///
/// The callback runs on the gathering thread and may run concurrently
/// with itself when several gathers overlap.
pub struct ValueFunc {
    desc: Desc,
    labels: Vec<LabelPair>,
    value_type: ValueType,
    function: ValueFn,
}

impl ValueFunc {
    pub fn new(
        opts: Opts,
        value_type: ValueType,
        function: impl Fn() -> f64 + Send + Sync + 'static,
    ) -> MetricResult<Self> {
        let desc = opts.desc(&[])?;
        let labels = desc.label_pairs(&[])?;
        Ok(Self {
            desc,
            labels,
            value_type,
            function: Box::new(function),
        })
    }

    pub fn counter(opts: Opts, function: impl Fn() -> f64 + Send + Sync + 'static) -> MetricResult<Self> {
        Self::new(opts, ValueType::Counter, function)
    }

    pub fn gauge(opts: Opts, function: impl Fn() -> f64 + Send + Sync + 'static) -> MetricResult<Self> {
        Self::new(opts, ValueType::Gauge, function)
    }

    pub fn untyped(opts: Opts, function: impl Fn() -> f64 + Send + Sync + 'static) -> MetricResult<Self> {
        Self::new(opts, ValueType::Untyped, function)
    }
}

impl std::fmt::Debug for ValueFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueFunc")
            .field("desc", &self.desc)
            .field("value_type", &self.value_type)
            .finish_non_exhaustive()
    }
}

impl Metric for ValueFunc {
    fn desc(&self) -> &Desc {
        &self.desc
    }

    fn write(&self) -> MetricResult<Sample> {
        Ok(Sample::new(
            self.labels.clone(),
            self.value_type.sample_value((self.function)()),
        ))
    }
}

pub type CounterFunc = ValueFunc;
pub type GaugeFunc = ValueFunc;
pub type UntypedFunc = ValueFunc;

self_collecting!(Counter, Gauge, Untyped, ValueFunc);
