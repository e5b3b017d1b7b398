//! Registration and gathering errors.

use std::fmt;

use tally_core::{MetricError, MetricType};
use thiserror::Error;

/// Result type alias for registration.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Result type alias for a gather that must be complete.
pub type GatherResult<T> = Result<T, GatherErrors>;

/// Why a collector was refused by [`Registry::register`](crate::Registry::register).
///
/// A refused collector leaves the registry unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The same collector instance is already registered.
    #[error("collector {collector} is already registered")]
    AlreadyRegistered { collector: String },

    /// One collector described the same descriptor more than once.
    #[error("descriptor {desc} is described more than once by the same collector")]
    DuplicateDescriptor { desc: String },

    #[error("descriptor {desc} has label names inconsistent with previously registered descriptors named {fq_name:?}")]
    InconsistentLabelDimension { fq_name: String, desc: String },

    #[error("descriptor {fq_name:?} has help {offered:?}, previously registered with help {registered:?}")]
    InconsistentHelp {
        fq_name: String,
        registered: String,
        offered: String,
    },
}

/// One problem found while gathering. The offending series is excluded;
/// everything else is still returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatherError {
    #[error("error writing metric {fq_name:?}: {source}")]
    Write {
        fq_name: String,
        #[source]
        source: MetricError,
    },

    #[error("collector {collector} panicked during collect: {message}")]
    CollectorPanic { collector: String, message: String },

    #[error("metric {fq_name:?} has help {got:?} but the family has help {expected:?}")]
    HelpMismatch {
        fq_name: String,
        expected: String,
        got: String,
    },

    #[error("metric {fq_name:?} is a {got} but the family is a {expected}")]
    TypeMismatch {
        fq_name: String,
        expected: MetricType,
        got: MetricType,
    },

    #[error("metric {fq_name:?} has label names {got:?}, expected {expected:?}")]
    LabelSetMismatch {
        fq_name: String,
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("metric {fq_name:?} with labels {{{labels}}} was collected more than once")]
    DuplicateSeries { fq_name: String, labels: String },

    #[error("collected metric with descriptor {desc} that its collector never described")]
    UnregisteredDescriptor { desc: String },
}

/// Every error of one gather, in the order they were detected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatherErrors(Vec<GatherError>);

impl GatherErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GatherError> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<GatherError> {
        self.0
    }

    pub(crate) fn push(&mut self, error: GatherError) {
        self.0.push(error);
    }
}

impl fmt::Display for GatherErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s) occurred during gathering:", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n* {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for GatherErrors {}

impl IntoIterator for GatherErrors {
    type Item = GatherError;
    type IntoIter = std::vec::IntoIter<GatherError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a GatherErrors {
    type Item = &'a GatherError;
    type IntoIter = std::slice::Iter<'a, GatherError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
