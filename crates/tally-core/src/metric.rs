//! The `Metric` and `Collector` contracts.

use crate::desc::Desc;
use crate::error::MetricResult;
use crate::record::Sample;

/// A single series: one descriptor, one label-value tuple, one current value.
pub trait Metric: Send + Sync {
    /// Descriptor of the family this series belongs to.
    fn desc(&self) -> &Desc;

    /// Snapshot the current value into an exposition record.
    fn write(&self) -> MetricResult<Sample>;
}

/// Anything that can describe its families and emit their current series.
///
/// `describe` must return the same set of descriptors on every call; the
/// registry validates a collector once, at registration, using it.
/// `collect` pushes each live metric into `sink` and may run concurrently
/// with other collectors and with writers of the metrics it emits.
pub trait Collector: Send + Sync {
    fn describe(&self) -> Vec<Desc>;

    fn collect(&self, sink: &mut dyn FnMut(&dyn Metric));
}

/// Collect every metric of `collector` and write it immediately.
pub fn collect_samples(collector: &dyn Collector) -> Vec<MetricResult<Sample>> {
    let mut samples = Vec::new();
    collector.collect(&mut |metric| samples.push(metric.write()));
    samples
}
