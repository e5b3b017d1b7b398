//! Collector registration and concurrent gathering.
//!
//! Registration validates a collector's descriptors once, up front:
//!
//! ```text
//! register(c)
//!   ├── same Arc already registered           → AlreadyRegistered
//!   ├── same descriptor id described twice    → DuplicateDescriptor
//!   ├── fq_name known with other label names  → InconsistentLabelDimension
//!   └── fq_name known with other help         → InconsistentHelp
//! ```
//!
//! Distinct collectors may describe the same descriptor: they share the
//! family and their series are merged at gather time.
//!
//! Gathering fans out over a bounded pool of scoped worker threads. Each
//! worker pulls the next collector from a shared cursor, writes every
//! metric it emits, and streams the samples to the assembler on the
//! calling thread, which groups them into sorted families:
//!
//! ```text
//! collectors ──► worker 1 ──┐
//!            ──► worker 2 ──┼── mpsc ──► assembler ──► Gathered { families, errors }
//!            ──► worker N ──┘
//! ```
//!
//! A collector that panics loses nothing it emitted before the panic and
//! never affects other collectors; the panic becomes a gather error.

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;

use parking_lot::RwLock;
use tally_core::{Collector, Desc, LabelPair, MetricFamily, MetricResult, MetricType, Sample};
use tracing::{debug, warn};

use crate::config::RegistryConfig;
use crate::error::{
    GatherError, GatherErrors, GatherResult, RegistrationError, RegistrationResult,
};

/// Anything that can produce a snapshot of metric families.
///
/// Transport layers depend on this trait rather than on [`Registry`].
pub trait Gatherer: Send + Sync {
    fn gather(&self) -> Gathered;
}

/// The outcome of one gather: every valid family plus every problem found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gathered {
    /// Sorted by name; series within a family sorted by label values.
    pub families: Vec<MetricFamily>,
    pub errors: GatherErrors,
}

impl Gathered {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// The families if no error occurred. Partial results are dropped on
    /// error; read the fields directly to keep them.
    pub fn into_result(self) -> GatherResult<Vec<MetricFamily>> {
        if self.errors.is_empty() {
            Ok(self.families)
        } else {
            Err(self.errors)
        }
    }
}

/// Pointer identity of a registered collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CollectorId(usize);

impl CollectorId {
    fn of<C: Collector + ?Sized>(collector: &Arc<C>) -> Self {
        Self(Arc::as_ptr(collector).cast::<()>() as usize)
    }
}

struct Registration {
    collector: Arc<dyn Collector>,
    /// Name used in logs and panic reports.
    name: String,
    /// Descriptor ids this collector described; empty for unchecked collectors.
    desc_ids: Arc<HashSet<u64>>,
}

/// Label schema and help every descriptor of one fq_name must share.
#[derive(Debug, Clone)]
struct FamilyShape {
    dim_hash: u64,
    help: String,
}

#[derive(Default)]
struct RegistryState {
    collectors: HashMap<CollectorId, Registration>,
    /// Retained after unregistration.
    shapes: HashMap<String, FamilyShape>,
}

/// Holds collectors and gathers their metrics.
///
/// The registry references collectors; it never owns or mutates the
/// metrics they emit.
pub struct Registry {
    config: RegistryConfig,
    state: RwLock<RegistryState>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("collectors", &self.state.read().collectors.len())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Number of registered collectors.
    pub fn len(&self) -> usize {
        self.state.read().collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate `collector`'s descriptors and add it to the registry.
    ///
    /// A collector whose `describe` yields nothing is accepted unchecked:
    /// its metrics are gathered but never validated against registrations.
    pub fn register(&self, collector: Arc<dyn Collector>) -> RegistrationResult<()> {
        let id = CollectorId::of(&collector);
        let descs = collector.describe();
        let name = descs
            .first()
            .map(|desc| desc.fq_name().to_string())
            .unwrap_or_else(|| "<unchecked>".to_string());

        let mut state = self.state.write();
        if state.collectors.contains_key(&id) {
            return Err(RegistrationError::AlreadyRegistered { collector: name });
        }

        let desc_ids = check_descs(&state, &descs)?;
        for desc in &descs {
            state
                .shapes
                .entry(desc.fq_name().to_string())
                .or_insert_with(|| FamilyShape {
                    dim_hash: desc.dim_hash(),
                    help: desc.help().to_string(),
                });
        }
        state.collectors.insert(
            id,
            Registration {
                collector,
                name: name.clone(),
                desc_ids: Arc::new(desc_ids),
            },
        );

        debug!(collector = %name, descriptors = descs.len(), "registered collector");
        Ok(())
    }

    /// Like [`Registry::register`] but panics on error.
    ///
    /// # Panics
    ///
    /// Panics with the registration error's message.
    pub fn must_register(&self, collector: Arc<dyn Collector>) {
        if let Err(e) = self.register(collector) {
            panic!("{e}");
        }
    }

    /// Remove a registered collector. Returns whether it was registered.
    ///
    /// The family shapes it established stay in force.
    pub fn unregister<C: Collector + ?Sized>(&self, collector: &Arc<C>) -> bool {
        let id = CollectorId::of(collector);
        let mut state = self.state.write();
        let Some(registration) = state.collectors.remove(&id) else {
            return false;
        };
        debug!(collector = %registration.name, "unregistered collector");
        true
    }

    /// Collect every registered collector and assemble sorted families.
    ///
    /// Never fails as a whole: problems are reported in
    /// [`Gathered::errors`] next to every family that could be assembled.
    pub fn gather(&self) -> Gathered {
        let snapshot: Vec<CollectTask> = {
            let state = self.state.read();
            state
                .collectors
                .values()
                .map(|registration| CollectTask {
                    collector: Arc::clone(&registration.collector),
                    name: registration.name.clone(),
                    desc_ids: Arc::clone(&registration.desc_ids),
                })
                .collect()
        };
        if snapshot.is_empty() {
            return Gathered::default();
        }

        let parallelism = self.config.max_parallelism.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        });
        let workers = snapshot.len().min(parallelism).max(1);

        let mut assembler = Assembler::new(self.config.pedantic);
        let cursor = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<Intake>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let cursor = &cursor;
                let tasks = &snapshot;
                scope.spawn(move || {
                    loop {
                        let index = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(task) = tasks.get(index) else {
                            break;
                        };
                        task.run(&tx);
                    }
                });
            }
            drop(tx);

            for intake in rx {
                assembler.accept(intake);
            }
        });

        let gathered = assembler.finish();
        debug!(
            collectors = snapshot.len(),
            workers,
            families = gathered.families.len(),
            errors = gathered.errors.len(),
            "gather complete"
        );
        gathered
    }
}

impl Gatherer for Registry {
    fn gather(&self) -> Gathered {
        Registry::gather(self)
    }
}

impl<G: Gatherer + ?Sized> Gatherer for Arc<G> {
    fn gather(&self) -> Gathered {
        (**self).gather()
    }
}

/// Validate a collector's descriptors against each other and the family
/// shapes already known to the registry.
fn check_descs(state: &RegistryState, descs: &[Desc]) -> RegistrationResult<HashSet<u64>> {
    let mut desc_ids = HashSet::with_capacity(descs.len());
    let mut new_shapes: HashMap<&str, (u64, &str)> = HashMap::new();

    for desc in descs {
        if !desc_ids.insert(desc.id()) {
            return Err(RegistrationError::DuplicateDescriptor {
                desc: desc.to_string(),
            });
        }

        let known = state
            .shapes
            .get(desc.fq_name())
            .map(|shape| (shape.dim_hash, shape.help.as_str()))
            .or_else(|| new_shapes.get(desc.fq_name()).copied());
        match known {
            Some((dim_hash, _)) if dim_hash != desc.dim_hash() => {
                return Err(RegistrationError::InconsistentLabelDimension {
                    fq_name: desc.fq_name().to_string(),
                    desc: desc.to_string(),
                });
            }
            Some((_, help)) if help != desc.help() => {
                return Err(RegistrationError::InconsistentHelp {
                    fq_name: desc.fq_name().to_string(),
                    registered: help.to_string(),
                    offered: desc.help().to_string(),
                });
            }
            Some(_) => {}
            None => {
                new_shapes.insert(desc.fq_name(), (desc.dim_hash(), desc.help()));
            }
        }
    }

    Ok(desc_ids)
}

// ── Collection ─────────────────────────────────────────────────────

struct CollectTask {
    collector: Arc<dyn Collector>,
    name: String,
    desc_ids: Arc<HashSet<u64>>,
}

enum Intake {
    Metric {
        desc: Desc,
        /// `None` for unchecked collectors.
        described: Option<Arc<HashSet<u64>>>,
        result: MetricResult<Sample>,
    },
    Panic {
        collector: String,
        message: String,
    },
}

impl CollectTask {
    fn run(&self, tx: &mpsc::Sender<Intake>) {
        let described = (!self.desc_ids.is_empty()).then(|| Arc::clone(&self.desc_ids));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.collector.collect(&mut |metric| {
                // The receiver outlives every worker.
                let _ = tx.send(Intake::Metric {
                    desc: metric.desc().clone(),
                    described: described.clone(),
                    result: metric.write(),
                });
            });
        }));
        if let Err(payload) = outcome {
            let _ = tx.send(Intake::Panic {
                collector: self.name.clone(),
                message: panic_message(&*payload),
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ── Assembly ───────────────────────────────────────────────────────

struct FamilyBuilder {
    help: String,
    metric_type: MetricType,
    label_names: Vec<String>,
    samples: Vec<Sample>,
    seen: HashSet<Vec<LabelPair>>,
}

struct Assembler {
    pedantic: bool,
    families: BTreeMap<String, FamilyBuilder>,
    errors: GatherErrors,
}

impl Assembler {
    fn new(pedantic: bool) -> Self {
        Self {
            pedantic,
            families: BTreeMap::new(),
            errors: GatherErrors::default(),
        }
    }

    fn accept(&mut self, intake: Intake) {
        match intake {
            Intake::Metric {
                desc,
                described,
                result,
            } => {
                if let Err(error) = self.add(&desc, described.as_deref(), result) {
                    self.report(error);
                }
            }
            Intake::Panic { collector, message } => {
                self.report(GatherError::CollectorPanic { collector, message });
            }
        }
    }

    fn report(&mut self, error: GatherError) {
        warn!(error = %error, "gather error");
        self.errors.push(error);
    }

    fn add(
        &mut self,
        desc: &Desc,
        described: Option<&HashSet<u64>>,
        result: MetricResult<Sample>,
    ) -> Result<(), GatherError> {
        let fq_name = desc.fq_name();
        let sample = result.map_err(|source| GatherError::Write {
            fq_name: fq_name.to_string(),
            source,
        })?;

        if self.pedantic && described.is_some_and(|ids| !ids.contains(&desc.id())) {
            return Err(GatherError::UnregisteredDescriptor {
                desc: desc.to_string(),
            });
        }

        let expected = desc_label_names(desc);
        let got: Vec<String> = sample.labels.iter().map(|pair| pair.name.clone()).collect();
        if got != expected {
            return Err(GatherError::LabelSetMismatch {
                fq_name: fq_name.to_string(),
                expected,
                got,
            });
        }

        let metric_type = sample.value.metric_type();
        let family = self
            .families
            .entry(fq_name.to_string())
            .or_insert_with(|| FamilyBuilder {
                help: desc.help().to_string(),
                metric_type,
                label_names: expected.clone(),
                samples: Vec::new(),
                seen: HashSet::new(),
            });

        if family.help != desc.help() {
            return Err(GatherError::HelpMismatch {
                fq_name: fq_name.to_string(),
                expected: family.help.clone(),
                got: desc.help().to_string(),
            });
        }
        if family.metric_type != metric_type {
            return Err(GatherError::TypeMismatch {
                fq_name: fq_name.to_string(),
                expected: family.metric_type,
                got: metric_type,
            });
        }
        if family.label_names != expected {
            return Err(GatherError::LabelSetMismatch {
                fq_name: fq_name.to_string(),
                expected: family.label_names.clone(),
                got: expected,
            });
        }
        if !family.seen.insert(sample.labels.clone()) {
            return Err(GatherError::DuplicateSeries {
                fq_name: fq_name.to_string(),
                labels: format_labels(&sample.labels),
            });
        }
        family.samples.push(sample);
        Ok(())
    }

    fn finish(self) -> Gathered {
        let families = self
            .families
            .into_iter()
            .map(|(name, mut family)| {
                family.samples.sort_by(|a, b| {
                    a.labels
                        .iter()
                        .map(|pair| &pair.value)
                        .cmp(b.labels.iter().map(|pair| &pair.value))
                });
                MetricFamily {
                    name,
                    help: family.help,
                    metric_type: family.metric_type,
                    metrics: family.samples,
                }
            })
            .collect();
        Gathered {
            families,
            errors: self.errors,
        }
    }
}

/// Sorted names of every label a series of `desc` carries.
fn desc_label_names(desc: &Desc) -> Vec<String> {
    let mut names: Vec<String> = desc
        .const_label_pairs()
        .iter()
        .map(|pair| pair.name.clone())
        .chain(desc.variable_labels().iter().cloned())
        .collect();
    names.sort_unstable();
    names
}

fn format_labels(labels: &[LabelPair]) -> String {
    labels
        .iter()
        .map(|pair| format!("{}={:?}", pair.name, pair.value))
        .collect::<Vec<_>>()
        .join(",")
}
