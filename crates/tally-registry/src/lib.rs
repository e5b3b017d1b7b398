//! tally-registry — collector registration and gathering.
//!
//! A [`Registry`] admits independently written collectors, rejects those
//! whose descriptors clash with what is already registered, and gathers
//! all of them concurrently into a deterministic list of metric families.
//!
//! # Architecture
//!
//! ```text
//! Registry
//!   ├── register(collector)    ← describe once, check ids / dims / help
//!   ├── unregister(collector)  ← by Arc identity
//!   └── gather()               → Gathered { families, errors }
//!         ├── scoped worker pool, one collector at a time per worker
//!         └── assembler: group by name, check, dedupe, sort
//!
//! Gatherer                     ← trait transport layers depend on
//! RegistryConfig               ← pedantic checks, worker cap (TOML)
//! ```

pub mod config;
pub mod error;
pub mod registry;

pub use config::RegistryConfig;
pub use error::{GatherError, GatherErrors, GatherResult, RegistrationError, RegistrationResult};
pub use registry::{Gathered, Gatherer, Registry};
