//! The process-wide default registry.
//!
//! Convenient for applications that want one registry without threading it
//! through every constructor. Libraries should accept a `&Registry` or a
//! [`Gatherer`] instead.

use std::sync::{Arc, OnceLock};

use tally_core::Collector;
use tally_registry::{Gathered, Gatherer, RegistrationResult, Registry};

static DEFAULT_REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The lazily created process-wide registry.
pub fn default_registry() -> &'static Registry {
    DEFAULT_REGISTRY.get_or_init(Registry::new)
}

/// Register `collector` with the default registry.
pub fn register(collector: Arc<dyn Collector>) -> RegistrationResult<()> {
    default_registry().register(collector)
}

/// Register `collector` with the default registry, panicking on error.
///
/// # Panics
///
/// Panics with the registration error's message.
pub fn must_register(collector: Arc<dyn Collector>) {
    default_registry().must_register(collector);
}

/// Remove `collector` from the default registry.
pub fn unregister<C: Collector + ?Sized>(collector: &Arc<C>) -> bool {
    default_registry().unregister(collector)
}

/// Gather the default registry.
pub fn gather() -> Gathered {
    default_registry().gather()
}

/// A [`Gatherer`] handle to the default registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGatherer;

impl Gatherer for DefaultGatherer {
    fn gather(&self) -> Gathered {
        default_registry().gather()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_metrics::{Gauge, Opts};

    #[test]
    fn default_registry_is_shared() {
        assert!(std::ptr::eq(default_registry(), default_registry()));
    }

    #[test]
    fn forwarding_functions_reach_the_default_registry() {
        let gauge = Arc::new(Gauge::new(Opts::new("global_forwarding_test", "Test gauge.")).unwrap());
        gauge.set(3.0);
        register(gauge.clone()).unwrap();

        let found = gather()
            .families
            .into_iter()
            .find(|family| family.name == "global_forwarding_test")
            .unwrap();
        assert_eq!(found.metrics[0].value.as_f64(), Some(3.0));
        assert!(DefaultGatherer
            .gather()
            .families
            .iter()
            .any(|family| family.name == "global_forwarding_test"));

        assert!(unregister(&gauge));
        assert!(!gather()
            .families
            .iter()
            .any(|family| family.name == "global_forwarding_test"));
    }
}
