//! Targeted-quantile stream (Cormode, Korn, Muthukrishnan, Srivastava).
//!
//! Keeps a compressed, value-ordered list of `(value, width, delta)` tuples.
//! For every target `(φ, ε)` a query for `φ` returns a value whose true rank
//! lies within `ε·n` of `φ·n`, while the list stays far smaller than `n`.
//!
//! Inserts are buffered and merged in sorted batches; the list is
//! compressed after each batch.

use crate::opts::Objective;

#[derive(Debug, Clone, Copy)]
struct Tuple {
    value: f64,
    /// Rank difference to the previous tuple.
    width: f64,
    /// Maximum rank uncertainty of this tuple.
    delta: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct Stream {
    targets: Vec<Objective>,
    tuples: Vec<Tuple>,
    buffer: Vec<f64>,
    buf_cap: usize,
    /// Observations merged into `tuples`.
    n: f64,
}

impl Stream {
    pub(crate) fn new(targets: &[Objective], buf_cap: usize) -> Self {
        Self {
            targets: targets.to_vec(),
            tuples: Vec::new(),
            buffer: Vec::with_capacity(buf_cap),
            buf_cap: buf_cap.max(1),
            n: 0.0,
        }
    }

    /// Combine several streams into one holding all of their observations.
    pub(crate) fn merged<'a>(
        targets: &[Objective],
        buf_cap: usize,
        streams: impl IntoIterator<Item = &'a Stream>,
    ) -> Self {
        let mut tuples: Vec<Tuple> = streams
            .into_iter()
            .flat_map(|stream| stream.tuples.iter().copied())
            .collect();
        tuples.sort_by(|a, b| a.value.total_cmp(&b.value));
        let mut merged = Self::new(targets, buf_cap);
        merged.merge(&tuples);
        merged
    }

    pub(crate) fn insert(&mut self, value: f64) {
        self.buffer.push(value);
        if self.buffer.len() >= self.buf_cap {
            self.flush();
        }
    }

    /// Merge buffered observations into the compressed list.
    pub(crate) fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let mut batch = std::mem::take(&mut self.buffer);
        batch.sort_by(f64::total_cmp);
        let tuples: Vec<Tuple> = batch
            .iter()
            .map(|&value| Tuple {
                value,
                width: 1.0,
                delta: 0.0,
            })
            .collect();
        self.merge(&tuples);
        batch.clear();
        self.buffer = batch;
    }

    pub(crate) fn reset(&mut self) {
        self.tuples.clear();
        self.buffer.clear();
        self.n = 0.0;
    }

    /// Number of observations, buffered ones included.
    pub(crate) fn count(&self) -> u64 {
        self.n as u64 + self.buffer.len() as u64
    }

    /// Estimate quantile `q` over flushed observations. NaN when empty.
    pub(crate) fn query(&self, q: f64) -> f64 {
        let Some((first, rest)) = self.tuples.split_first() else {
            return f64::NAN;
        };
        let mut t = (q * self.n).ceil();
        t += (self.invariant(t) / 2.0).ceil();

        let mut previous = first;
        let mut rank = 0.0;
        for current in rest {
            rank += previous.width;
            if rank + current.width + current.delta > t {
                return previous.value;
            }
            previous = current;
        }
        previous.value
    }

    /// Allowed rank uncertainty at rank `r`.
    fn invariant(&self, r: f64) -> f64 {
        let n = self.n;
        self.targets
            .iter()
            .map(|target| {
                let (q, e) = (target.quantile, target.error);
                if q * n <= r {
                    2.0 * e * r / q
                } else {
                    2.0 * e * (n - r) / (1.0 - q)
                }
            })
            .fold(f64::MAX, f64::min)
    }

    /// Insert value-sorted `incoming` tuples, then compress.
    fn merge(&mut self, incoming: &[Tuple]) {
        let mut rank = 0.0;
        let mut i = 0;
        for sample in incoming {
            while i < self.tuples.len() && self.tuples[i].value <= sample.value {
                rank += self.tuples[i].width;
                i += 1;
            }
            let delta = if i < self.tuples.len() {
                sample.delta.max(self.invariant(rank).floor() - 1.0)
            } else {
                0.0
            };
            self.tuples.insert(
                i,
                Tuple {
                    value: sample.value,
                    width: sample.width,
                    delta,
                },
            );
            i += 1;
            self.n += sample.width;
            rank += sample.width;
        }
        self.compress();
    }

    fn compress(&mut self) {
        if self.tuples.len() < 2 {
            return;
        }
        let mut xi = self.tuples.len() - 1;
        let mut x = self.tuples[xi];
        let mut rank = self.n - 1.0 - x.width;

        for i in (0..self.tuples.len() - 1).rev() {
            let c = self.tuples[i];
            if c.width + x.width + x.delta <= self.invariant(rank) {
                x.width += c.width;
                self.tuples[xi] = x;
                self.tuples.remove(i);
                xi -= 1;
            } else {
                x = c;
                xi = i;
            }
            rank -= c.width;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets() -> Vec<Objective> {
        vec![
            Objective::new(0.5, 0.05),
            Objective::new(0.9, 0.01),
            Objective::new(0.99, 0.001),
        ]
    }

    /// 0..n in a scrambled but deterministic order.
    fn scrambled(n: u64) -> impl Iterator<Item = f64> {
        (0..n).map(move |i| ((i * 7919) % n) as f64)
    }

    #[test]
    fn empty_stream_yields_nan() {
        let stream = Stream::new(&targets(), 10);
        assert!(stream.query(0.5).is_nan());
        assert_eq!(stream.count(), 0);
    }

    #[test]
    fn targets_stay_within_error() {
        let mut stream = Stream::new(&targets(), 100);
        for v in scrambled(10_000) {
            stream.insert(v);
        }
        stream.flush();
        assert_eq!(stream.count(), 10_000);

        for target in targets() {
            let estimate = stream.query(target.quantile);
            let expected = target.quantile * 10_000.0;
            let slack = target.error * 10_000.0 + 1.0;
            assert!(
                (estimate - expected).abs() <= slack,
                "q={} estimate={estimate} expected={expected}",
                target.quantile
            );
        }
    }

    #[test]
    fn compression_bounds_memory() {
        let mut stream = Stream::new(&[Objective::new(0.5, 0.05)], 500);
        for v in scrambled(10_000) {
            stream.insert(v);
        }
        stream.flush();
        assert!(stream.tuples.len() < 1_000, "kept {}", stream.tuples.len());
    }

    #[test]
    fn merged_stream_covers_all_inputs() {
        let mut low = Stream::new(&targets(), 50);
        let mut high = Stream::new(&targets(), 50);
        for v in scrambled(1_000) {
            low.insert(v);
            high.insert(v + 1_000.0);
        }
        low.flush();
        high.flush();

        let merged = Stream::merged(&targets(), 50, [&low, &high]);
        assert_eq!(merged.count(), 2_000);
        let median = merged.query(0.5);
        assert!((900.0..=1_100.0).contains(&median), "median {median}");
        let p99 = merged.query(0.99);
        assert!(p99 > 1_900.0, "p99 {p99}");
    }

    #[test]
    fn reset_clears_everything() {
        let mut stream = Stream::new(&targets(), 4);
        for v in 0..10 {
            stream.insert(v as f64);
        }
        stream.reset();
        assert_eq!(stream.count(), 0);
        assert!(stream.query(0.9).is_nan());
    }
}
