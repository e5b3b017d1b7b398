//! Integration tests for the periodic snapshot publisher.

use std::sync::Arc;
use std::time::Duration;

use tally::{Counter, Gatherer, Opts, Registry, SnapshotPublisher};
use tally_core::{Collector, Desc, Metric, MetricError, MetricResult, Sample};

struct Failing {
    desc: Desc,
}

impl Metric for Failing {
    fn desc(&self) -> &Desc {
        &self.desc
    }

    fn write(&self) -> MetricResult<Sample> {
        Err(MetricError::Custom("unavailable".into()))
    }
}

impl Collector for Failing {
    fn describe(&self) -> Vec<Desc> {
        vec![self.desc.clone()]
    }

    fn collect(&self, sink: &mut dyn FnMut(&dyn Metric)) {
        sink(self);
    }
}

// ── AC: publishes snapshots on an interval ─────────────────────────

#[tokio::test]
async fn publishes_latest_snapshot() {
    let registry = Arc::new(Registry::new());
    let counter = Arc::new(Counter::new(Opts::new("ticks_total", "Ticks.")).unwrap());
    registry.register(counter.clone()).unwrap();
    counter.inc_by(5.0);

    let publisher = SnapshotPublisher::spawn(registry.clone() as Arc<dyn Gatherer>, Duration::from_millis(10));
    let mut rx = publisher.subscribe();

    let snapshot = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            rx.changed().await.unwrap();
            if let Some(snapshot) = rx.borrow_and_update().clone() {
                return snapshot;
            }
        }
    })
    .await
    .expect("snapshot within timeout");

    assert!(snapshot.is_complete());
    assert_eq!(snapshot.families[0].name, "ticks_total");
    assert_eq!(snapshot.families[0].metrics[0].value.as_f64(), Some(5.0));

    counter.inc();
    let updated = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            rx.changed().await.unwrap();
            let latest = rx.borrow_and_update().clone();
            if let Some(snapshot) = latest {
                if snapshot.families[0].metrics[0].value.as_f64() == Some(6.0) {
                    return snapshot;
                }
            }
        }
    })
    .await
    .expect("updated snapshot within timeout");
    assert!(publisher.latest().is_some());
    assert!(updated.is_complete());

    publisher.shutdown().await;
}

#[tokio::test]
async fn gather_errors_are_published_with_partial_results() {
    let registry = Arc::new(Registry::new());
    let healthy = Arc::new(Counter::new(Opts::new("healthy_total", "Healthy.")).unwrap());
    registry.register(healthy).unwrap();
    registry
        .register(Arc::new(Failing {
            desc: Desc::new("failing", "Always fails.", &[], &Default::default()).unwrap(),
        }))
        .unwrap();

    let publisher = SnapshotPublisher::spawn(registry, Duration::from_millis(10));
    let mut rx = publisher.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            rx.changed().await.unwrap();
            if let Some(snapshot) = rx.borrow_and_update().clone() {
                return snapshot;
            }
        }
    })
    .await
    .expect("snapshot within timeout");

    assert_eq!(snapshot.families.len(), 1);
    assert_eq!(snapshot.errors.len(), 1);
    publisher.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_publishing() {
    let publisher = SnapshotPublisher::spawn(Arc::new(tally::DefaultGatherer), Duration::from_millis(5));
    let rx = publisher.subscribe();
    tokio::time::timeout(Duration::from_secs(5), publisher.shutdown())
        .await
        .expect("publisher stops promptly");

    // The sender is gone once the task has exited.
    assert!(rx.has_changed().is_err());
}
