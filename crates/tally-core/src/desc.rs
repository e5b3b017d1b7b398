//! Metric descriptors.
//!
//! A [`Desc`] is the immutable identity of a metric family: its
//! fully-qualified name, help text, variable label schema, and const labels.
//! Two hashes are derived at construction:
//!
//! ```text
//! id       = hash(fq_name, const label values in label-name order)
//! dim_hash = hash(sorted label names, const ∪ variable)
//! ```
//!
//! The registry uses `id` to find descriptors of the same family and
//! `dim_hash` to reject a family redefined with a different label schema.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::error::{DescError, DescResult, MetricError, MetricResult};
use crate::hash::{LabelHasher, hash_parts};
use crate::record::LabelPair;

static METRIC_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("metric name pattern compiles")
});

static LABEL_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("label name pattern compiles")
});

/// Prefix of label names reserved for internal use.
pub const RESERVED_LABEL_PREFIX: &str = "__";

/// Whether `name` matches the metric name grammar.
pub fn is_valid_metric_name(name: &str) -> bool {
    METRIC_NAME_RE.is_match(name)
}

/// Whether `name` matches the label name grammar (reserved names included).
pub fn is_valid_label_name(name: &str) -> bool {
    LABEL_NAME_RE.is_match(name)
}

/// Join namespace, subsystem, and name with `_`, skipping empty parts.
///
/// An empty `name` yields an empty string: there is no metric to name.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

fn check_label_name(name: &str) -> DescResult<()> {
    if !is_valid_label_name(name) {
        return Err(DescError::InvalidLabelName(name.to_string()));
    }
    if name.starts_with(RESERVED_LABEL_PREFIX) {
        return Err(DescError::ReservedLabelName(name.to_string()));
    }
    Ok(())
}

/// Immutable metric family descriptor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Desc {
    inner: Arc<DescInner>,
}

#[derive(Debug)]
struct DescInner {
    fq_name: String,
    help: String,
    /// Sorted by label name.
    const_label_pairs: Vec<LabelPair>,
    /// In declaration order; label values are supplied in this order.
    variable_labels: Vec<String>,
    id: u64,
    dim_hash: u64,
}

impl Desc {
    /// Validate and build a descriptor.
    pub fn new(
        fq_name: impl Into<String>,
        help: impl Into<String>,
        variable_labels: &[&str],
        const_labels: &HashMap<String, String>,
    ) -> DescResult<Self> {
        let fq_name = fq_name.into();
        let help = help.into();

        if help.is_empty() {
            return Err(DescError::EmptyHelp(fq_name));
        }
        if !is_valid_metric_name(&fq_name) {
            return Err(DescError::InvalidMetricName(fq_name));
        }

        let sorted_const: BTreeMap<&str, &str> = const_labels
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        for name in sorted_const.keys() {
            check_label_name(name)?;
        }

        let mut seen = HashSet::with_capacity(variable_labels.len());
        for name in variable_labels {
            check_label_name(name)?;
            if sorted_const.contains_key(name) {
                return Err(DescError::ConstLabelCollision(name.to_string()));
            }
            if !seen.insert(*name) {
                return Err(DescError::DuplicateLabelName(name.to_string()));
            }
        }

        let mut id_hasher = LabelHasher::new();
        id_hasher.write_str(&fq_name);
        for value in sorted_const.values() {
            id_hasher.write_str(value);
        }

        let mut all_names: Vec<&str> = sorted_const
            .keys()
            .copied()
            .chain(variable_labels.iter().copied())
            .collect();
        all_names.sort_unstable();

        Ok(Self {
            inner: Arc::new(DescInner {
                id: id_hasher.finish(),
                dim_hash: hash_parts(all_names),
                const_label_pairs: sorted_const
                    .into_iter()
                    .map(|(name, value)| LabelPair::new(name, value))
                    .collect(),
                variable_labels: variable_labels.iter().map(|s| s.to_string()).collect(),
                fq_name,
                help,
            }),
        })
    }

    /// Like [`Desc::new`] but panics on an invalid descriptor.
    ///
    /// Meant for statics and other initialization paths where an invalid
    /// descriptor is a programming error.
    ///
    /// # Panics
    ///
    /// Panics with the validation error's message.
    pub fn must_new(
        fq_name: impl Into<String>,
        help: impl Into<String>,
        variable_labels: &[&str],
        const_labels: &HashMap<String, String>,
    ) -> Self {
        match Self::new(fq_name, help, variable_labels, const_labels) {
            Ok(desc) => desc,
            Err(e) => panic!("invalid metric descriptor: {e}"),
        }
    }

    pub fn fq_name(&self) -> &str {
        &self.inner.fq_name
    }

    pub fn help(&self) -> &str {
        &self.inner.help
    }

    pub fn variable_labels(&self) -> &[String] {
        &self.inner.variable_labels
    }

    pub fn const_label_pairs(&self) -> &[LabelPair] {
        &self.inner.const_label_pairs
    }

    /// Family identity: fq_name plus const label values.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Fingerprint of the full label-name schema.
    pub fn dim_hash(&self) -> u64 {
        self.inner.dim_hash
    }

    /// Total number of labels on each series (const + variable).
    pub fn label_count(&self) -> usize {
        self.inner.const_label_pairs.len() + self.inner.variable_labels.len()
    }

    /// Build the sorted label pairs of one series of this family.
    pub fn label_pairs(&self, values: &[&str]) -> MetricResult<Vec<LabelPair>> {
        let names = &self.inner.variable_labels;
        if values.len() != names.len() {
            return Err(MetricError::LabelCardinality {
                fq_name: self.inner.fq_name.clone(),
                expected: names.len(),
                got: values.len(),
            });
        }

        let mut pairs = Vec::with_capacity(self.label_count());
        pairs.extend(self.inner.const_label_pairs.iter().cloned());
        pairs.extend(
            names
                .iter()
                .zip(values)
                .map(|(name, value)| LabelPair::new(name.as_str(), *value)),
        );
        pairs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pairs)
    }
}

impl fmt::Display for Desc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let const_labels = self
            .inner
            .const_label_pairs
            .iter()
            .map(|pair| format!("{}={:?}", pair.name, pair.value))
            .collect::<Vec<_>>()
            .join(",");
        write!(
            f,
            "Desc{{fq_name: {:?}, help: {:?}, const_labels: {{{}}}, variable_labels: [{}]}}",
            self.inner.fq_name,
            self.inner.help,
            const_labels,
            self.inner.variable_labels.join(",")
        )
    }
}
