//! # Procedure Registry
//!
//! The [`ProcedureRegistry`] associates `(service, method, encoding)` triples with
//! envelope-level handlers. There is no ambient global registry: one is built explicitly at
//! composition time and handed to a [`crate::dispatch::Dispatcher`].
//!
//! It uses a **Typestate Pattern** to separate setup from serving:
//!
//! 1. **[`Building`]**: procedures can be registered. A duplicate triple is rejected with
//!    [`RegistryError::DuplicateRegistration`].
//! 2. **[`Sealed`]**: the table is frozen and can only be looked up. A sealed registry is
//!    immutable, so concurrent lookups need no lock.
//!
//! ## Example
//!
//! ```rust
//! use ferrule_core::registry::{BuildProceduresParams, ProcedureRegistry, build_procedures};
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = ProcedureRegistry::new();
//! registry.register_all(build_procedures(BuildProceduresParams::new("kv.KeyValue")))?;
//! let registry = registry.seal();
//! assert_eq!(registry.len(), 0);
//! # Ok(())
//! # }
//! ```
mod building;
mod procedures;
mod sealed;
mod types;

pub use procedures::*;
pub use types::*;

use std::collections::{BTreeMap, HashMap};

/// The registry of procedures served by one dispatcher.
///
/// The generic parameter `S` represents the current state of the registry.
#[derive(Debug, Clone)]
pub struct ProcedureRegistry<S = Building> {
    state: S,
}

/// State: procedures are being registered.
#[derive(Debug, Clone, Default)]
pub struct Building {
    procedures: BTreeMap<ProcedureKey, HandlerSpec>,
}

/// State: frozen, lookup only.
#[derive(Debug, Clone)]
pub struct Sealed {
    procedures: HashMap<ProcedureKey, HandlerSpec>,
}

/// Read access shared by every registry state.
pub trait RegistryState {
    fn procedure_keys(&self) -> impl Iterator<Item = &ProcedureKey>;
}

impl RegistryState for Building {
    fn procedure_keys(&self) -> impl Iterator<Item = &ProcedureKey> {
        self.procedures.keys()
    }
}

impl RegistryState for Sealed {
    fn procedure_keys(&self) -> impl Iterator<Item = &ProcedureKey> {
        self.procedures.keys()
    }
}

impl<S: RegistryState> ProcedureRegistry<S> {
    /// Number of registered procedures.
    pub fn len(&self) -> usize {
        self.state.procedure_keys().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All registered keys, sorted by service, method and encoding.
    pub fn keys(&self) -> Vec<&ProcedureKey> {
        let mut keys: Vec<_> = self.state.procedure_keys().collect();
        keys.sort();
        keys
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Procedure {0} is already registered")]
    DuplicateRegistration(ProcedureKey),
}
