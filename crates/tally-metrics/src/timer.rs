//! Scoped duration timing.

use std::time::{Duration, Instant};

/// Anything that accepts observations: histograms and summaries.
pub trait Observer: Send + Sync {
    fn observe(&self, value: f64);
}

/// Observes the seconds elapsed since [`Timer::start`] into an [`Observer`].
///
/// The observation happens exactly once: on [`Timer::observe_duration`] or,
/// if that is never called, when the timer is dropped. Early returns and
/// unwinding still record a duration.
#[must_use = "a timer observes when dropped; bind it to a variable"]
pub struct Timer<'a> {
    observer: &'a dyn Observer,
    start: Instant,
    observed: bool,
}

impl<'a> Timer<'a> {
    pub fn start(observer: &'a dyn Observer) -> Self {
        Self {
            observer,
            start: Instant::now(),
            observed: false,
        }
    }

    /// Observe now and return the elapsed time.
    pub fn observe_duration(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        let elapsed = self.start.elapsed();
        if !self.observed {
            self.observed = true;
            self.observer.observe(elapsed.as_secs_f64());
        }
        elapsed
    }
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        self.record();
    }
}
