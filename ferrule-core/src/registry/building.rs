//! # Registry State: Building
//!
//! Registration happens during single-threaded setup. Every error returned here is a
//! programming error and should abort startup.
use super::{Building, ProcedureRegistry, RegistryError, Sealed};
use crate::{
    codec::Encoding,
    registry::{HandlerSpec, Procedure, ProcedureKey},
};

impl ProcedureRegistry<Building> {
    pub fn new() -> Self {
        Self {
            state: Building::default(),
        }
    }

    /// Registers a handler under one `(service, method, encoding)` triple.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The procedure was added.
    /// * `Err(RegistryError::DuplicateRegistration)` - The exact triple is already registered.
    pub fn register(
        &mut self,
        service: impl Into<String>,
        method: impl Into<String>,
        encoding: Encoding,
        handler: HandlerSpec,
    ) -> Result<(), RegistryError> {
        let key = ProcedureKey::new(service, method, encoding.name());

        if self.state.procedures.contains_key(&key) {
            return Err(RegistryError::DuplicateRegistration(key));
        }

        tracing::debug!(procedure = %key, kind = %handler.kind(), "Registered procedure");
        self.state.procedures.insert(key, handler);
        Ok(())
    }

    /// Registers every procedure, stopping at the first duplicate.
    pub fn register_all(
        &mut self,
        procedures: impl IntoIterator<Item = Procedure>,
    ) -> Result<(), RegistryError> {
        for procedure in procedures {
            self.register(
                procedure.service,
                procedure.method,
                procedure.encoding,
                procedure.handler,
            )?;
        }
        Ok(())
    }

    /// Freezes the registry for lookup.
    pub fn seal(self) -> ProcedureRegistry<Sealed> {
        tracing::debug!(procedures = self.state.procedures.len(), "Sealed procedure registry");
        ProcedureRegistry {
            state: Sealed {
                procedures: self.state.procedures.into_iter().collect(),
            },
        }
    }
}

impl Default for ProcedureRegistry<Building> {
    fn default() -> Self {
        Self::new()
    }
}
