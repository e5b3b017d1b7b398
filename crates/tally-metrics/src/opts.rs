//! Metric options.
//!
//! Every option type deserializes with serde, so metric definitions can
//! live in TOML or JSON configuration:
//!
//! ```toml
//! name = "request_duration_seconds"
//! namespace = "api"
//! help = "Request latency."
//! buckets = [0.01, 0.1, 1.0]
//!
//! [const_labels]
//! service = "checkout"
//! ```
//!
//! Durations are written as strings: `"250ms"`, `"30s"`, `"10m"`, `"1h"`.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tally_core::{Desc, MetricError, MetricResult, build_fq_name};

/// Default histogram buckets, tailored to request latencies in seconds.
pub const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Default summary objectives as (quantile, absolute error).
pub const DEFAULT_OBJECTIVES: [(f64, f64); 3] = [(0.5, 0.05), (0.9, 0.01), (0.99, 0.001)];

/// Default window over which summary quantiles are computed.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10 * 60);

/// Default number of rotating sub-windows in a summary.
pub const DEFAULT_AGE_BUCKETS: u32 = 5;

/// Default number of observations buffered before a quantile stream flush.
pub const DEFAULT_BUF_CAP: u32 = 500;

// ── Common options ─────────────────────────────────────────────────

/// Name, help, and const labels shared by every metric kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Opts {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub subsystem: String,
    pub name: String,
    pub help: String,
    /// Labels with a fixed value on every series of the metric.
    #[serde(default)]
    pub const_labels: HashMap<String, String>,
}

impl Opts {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            ..Self::default()
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = subsystem.into();
        self
    }

    pub fn const_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.const_labels.insert(name.into(), value.into());
        self
    }

    pub fn fq_name(&self) -> String {
        build_fq_name(&self.namespace, &self.subsystem, &self.name)
    }

    /// Build the descriptor for these options and the given variable labels.
    pub fn desc(&self, variable_labels: &[&str]) -> MetricResult<Desc> {
        Ok(Desc::new(
            self.fq_name(),
            self.help.clone(),
            variable_labels,
            &self.const_labels,
        )?)
    }
}

// ── Histogram ──────────────────────────────────────────────────────

/// Options for histograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramOpts {
    #[serde(flatten)]
    pub common: Opts,
    /// Ascending bucket upper bounds. Empty selects [`DEFAULT_BUCKETS`].
    #[serde(default)]
    pub buckets: Vec<f64>,
}

impl HistogramOpts {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Opts::new(name, help).into()
    }

    pub fn buckets(mut self, buckets: Vec<f64>) -> Self {
        self.buckets = buckets;
        self
    }

    /// Validated finite bucket bounds: defaults applied, trailing `+Inf` dropped.
    pub fn resolved_buckets(&self) -> MetricResult<Vec<f64>> {
        let mut buckets = if self.buckets.is_empty() {
            DEFAULT_BUCKETS.to_vec()
        } else {
            self.buckets.clone()
        };
        if buckets.last() == Some(&f64::INFINITY) {
            buckets.pop();
        }
        if buckets.iter().any(|b| b.is_nan()) {
            return Err(MetricError::InvalidBuckets("NaN bucket bound".into()));
        }
        if let Some(pair) = buckets.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(MetricError::InvalidBuckets(format!(
                "bounds must be strictly increasing, found {} followed by {}",
                pair[0], pair[1]
            )));
        }
        Ok(buckets)
    }
}

impl From<Opts> for HistogramOpts {
    fn from(common: Opts) -> Self {
        Self {
            common,
            buckets: Vec::new(),
        }
    }
}

/// `count` buckets starting at `start`, each `width` wide.
pub fn linear_buckets(start: f64, width: f64, count: usize) -> MetricResult<Vec<f64>> {
    if count < 1 {
        return Err(MetricError::InvalidBuckets(
            "linear_buckets needs a positive count".into(),
        ));
    }
    if width <= 0.0 {
        return Err(MetricError::InvalidBuckets(
            "linear_buckets needs a positive width".into(),
        ));
    }
    Ok((0..count).map(|i| start + width * i as f64).collect())
}

/// `count` buckets starting at `start`, each `factor` times the previous.
pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> MetricResult<Vec<f64>> {
    if count < 1 {
        return Err(MetricError::InvalidBuckets(
            "exponential_buckets needs a positive count".into(),
        ));
    }
    if start <= 0.0 {
        return Err(MetricError::InvalidBuckets(
            "exponential_buckets needs a positive start value".into(),
        ));
    }
    if factor <= 1.0 {
        return Err(MetricError::InvalidBuckets(
            "exponential_buckets needs a factor greater than 1".into(),
        ));
    }
    let mut buckets = Vec::with_capacity(count);
    let mut bound = start;
    for _ in 0..count {
        buckets.push(bound);
        bound *= factor;
    }
    Ok(buckets)
}

// ── Summary ────────────────────────────────────────────────────────

/// A target quantile and the absolute rank error allowed when estimating it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub quantile: f64,
    pub error: f64,
}

impl Objective {
    pub fn new(quantile: f64, error: f64) -> Self {
        Self { quantile, error }
    }
}

fn default_objectives() -> Vec<Objective> {
    DEFAULT_OBJECTIVES
        .iter()
        .map(|&(quantile, error)| Objective::new(quantile, error))
        .collect()
}

fn default_max_age() -> Duration {
    DEFAULT_MAX_AGE
}

fn default_age_buckets() -> u32 {
    DEFAULT_AGE_BUCKETS
}

fn default_buf_cap() -> u32 {
    DEFAULT_BUF_CAP
}

/// Options for summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryOpts {
    #[serde(flatten)]
    pub common: Opts,
    #[serde(default = "default_objectives")]
    pub objectives: Vec<Objective>,
    /// How long an observation stays relevant for quantile estimation.
    #[serde(default = "default_max_age", with = "duration_str")]
    pub max_age: Duration,
    /// Number of sub-windows `max_age` is divided into. 0 selects the default.
    #[serde(default = "default_age_buckets")]
    pub age_buckets: u32,
    /// Observations buffered per sub-window before a flush. 0 selects the default.
    #[serde(default = "default_buf_cap")]
    pub buf_cap: u32,
}

impl SummaryOpts {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Opts::new(name, help).into()
    }

    pub fn objectives(mut self, objectives: Vec<Objective>) -> Self {
        self.objectives = objectives;
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn age_buckets(mut self, age_buckets: u32) -> Self {
        self.age_buckets = age_buckets;
        self
    }

    pub fn buf_cap(mut self, buf_cap: u32) -> Self {
        self.buf_cap = buf_cap;
        self
    }

    /// Validate the options and apply defaults for zero values.
    pub fn resolve(&self) -> MetricResult<SummaryConfig> {
        let mut objectives = self.objectives.clone();
        for objective in &objectives {
            let in_range = |v: f64| v > 0.0 && v < 1.0;
            if !in_range(objective.quantile) || !in_range(objective.error) {
                return Err(MetricError::InvalidOption(format!(
                    "objective {{quantile: {}, error: {}}} must lie strictly between 0 and 1",
                    objective.quantile, objective.error
                )));
            }
        }
        objectives.sort_by(|a, b| a.quantile.total_cmp(&b.quantile));
        objectives.dedup_by(|a, b| a.quantile == b.quantile);

        if self.max_age.is_zero() {
            return Err(MetricError::InvalidOption(
                "summary max_age must be positive".into(),
            ));
        }

        let age_buckets = match self.age_buckets {
            0 => DEFAULT_AGE_BUCKETS,
            n => n,
        };
        let buf_cap = match self.buf_cap {
            0 => DEFAULT_BUF_CAP,
            n => n,
        };

        Ok(SummaryConfig {
            objectives,
            max_age: self.max_age,
            age_buckets,
            buf_cap: buf_cap as usize,
        })
    }
}

impl From<Opts> for SummaryOpts {
    fn from(common: Opts) -> Self {
        Self {
            common,
            objectives: default_objectives(),
            max_age: DEFAULT_MAX_AGE,
            age_buckets: DEFAULT_AGE_BUCKETS,
            buf_cap: DEFAULT_BUF_CAP,
        }
    }
}

/// Validated summary parameters, shared by every series of a summary vector.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryConfig {
    /// Sorted by quantile, no duplicates.
    pub objectives: Vec<Objective>,
    pub max_age: Duration,
    pub age_buckets: u32,
    pub buf_cap: usize,
}

// ── Durations ──────────────────────────────────────────────────────

/// Parse `"250ms"`, `"30s"`, `"10m"`, `"1h"`, or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (digits, unit) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, Duration::from_millis(1))
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, Duration::from_secs(1))
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, Duration::from_secs(60))
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, Duration::from_secs(3600))
    } else {
        (s, Duration::from_secs(1))
    };
    let count = digits.trim().parse::<u32>().ok()?;
    unit.checked_mul(count)
}

pub(crate) mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        if value.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", value.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", value.as_millis()))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid duration {raw:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fq_name_joins_parts() {
        let opts = Opts::new("requests_total", "Total requests.")
            .namespace("api")
            .subsystem("http");
        assert_eq!(opts.fq_name(), "api_http_requests_total");
        let desc = opts.desc(&["code"]).unwrap();
        assert_eq!(desc.fq_name(), "api_http_requests_total");
    }

    #[test]
    fn desc_errors_surface_as_metric_errors() {
        let err = Opts::new("bad name", "help").desc(&[]).unwrap_err();
        assert!(matches!(err, MetricError::Desc(_)));
    }

    #[test]
    fn buckets_default_and_drop_infinity() {
        let opts = HistogramOpts::new("h", "help");
        assert_eq!(opts.resolved_buckets().unwrap(), DEFAULT_BUCKETS.to_vec());

        let opts = HistogramOpts::new("h", "help").buckets(vec![1.0, 2.0, f64::INFINITY]);
        assert_eq!(opts.resolved_buckets().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn buckets_must_increase() {
        let opts = HistogramOpts::new("h", "help").buckets(vec![1.0, 1.0]);
        assert!(matches!(
            opts.resolved_buckets(),
            Err(MetricError::InvalidBuckets(_))
        ));
    }

    #[test]
    fn bucket_helpers() {
        assert_eq!(linear_buckets(1.0, 2.0, 3).unwrap(), vec![1.0, 3.0, 5.0]);
        assert_eq!(
            exponential_buckets(1.0, 10.0, 3).unwrap(),
            vec![1.0, 10.0, 100.0]
        );
        assert!(linear_buckets(0.0, 1.0, 0).is_err());
        assert!(exponential_buckets(0.0, 2.0, 3).is_err());
        assert!(exponential_buckets(1.0, 1.0, 3).is_err());
    }

    #[test]
    fn summary_resolve_applies_defaults() {
        let config = SummaryOpts::new("s", "help")
            .age_buckets(0)
            .buf_cap(0)
            .objectives(vec![Objective::new(0.9, 0.01), Objective::new(0.5, 0.05)])
            .resolve()
            .unwrap();
        assert_eq!(config.age_buckets, DEFAULT_AGE_BUCKETS);
        assert_eq!(config.buf_cap, DEFAULT_BUF_CAP as usize);
        assert_eq!(config.objectives[0].quantile, 0.5);
        assert_eq!(config.objectives[1].quantile, 0.9);
    }

    #[test]
    fn summary_resolve_rejects_bad_values() {
        let bad_quantile = SummaryOpts::new("s", "help").objectives(vec![Objective::new(1.0, 0.01)]);
        assert!(matches!(
            bad_quantile.resolve(),
            Err(MetricError::InvalidOption(_))
        ));
        let zero_age = SummaryOpts::new("s", "help").max_age(Duration::ZERO);
        assert!(zero_age.resolve().is_err());
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("10m"), Some(Duration::from_secs(600)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("15"), Some(Duration::from_secs(15)));
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn histogram_opts_from_toml() {
        let opts: HistogramOpts = toml::from_str(
            r#"
name = "request_duration_seconds"
namespace = "api"
help = "Request latency."
buckets = [0.01, 0.1, 1.0]

[const_labels]
service = "checkout"
"#,
        )
        .unwrap();
        assert_eq!(opts.common.fq_name(), "api_request_duration_seconds");
        assert_eq!(opts.buckets, vec![0.01, 0.1, 1.0]);
        assert_eq!(opts.common.const_labels["service"], "checkout");
    }

    #[test]
    fn summary_opts_from_toml_with_defaults() {
        let opts: SummaryOpts = toml::from_str(
            r#"
name = "rpc_duration_seconds"
help = "RPC latency."
max_age = "2m"

[[objectives]]
quantile = 0.99
error = 0.001
"#,
        )
        .unwrap();
        assert_eq!(opts.max_age, Duration::from_secs(120));
        assert_eq!(opts.age_buckets, DEFAULT_AGE_BUCKETS);
        assert_eq!(opts.objectives, vec![Objective::new(0.99, 0.001)]);
    }

    #[test]
    fn summary_opts_json_round_trip_keeps_duration_format() {
        let opts = SummaryOpts::new("s", "help").max_age(Duration::from_millis(1500));
        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(json["max_age"], "1500ms");
        let back: SummaryOpts = serde_json::from_value(json).unwrap();
        assert_eq!(back, opts);
    }
}
