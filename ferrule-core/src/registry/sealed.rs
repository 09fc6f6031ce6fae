//! # Registry State: Sealed
use super::{ProcedureRegistry, Sealed};
use crate::{
    error::CallError,
    registry::{HandlerSpec, ProcedureKey},
};

impl ProcedureRegistry<Sealed> {
    /// Looks up the handler registered under exactly this triple.
    ///
    /// # Returns
    ///
    /// * `Ok(&HandlerSpec)` - The registered handler.
    /// * `Err(CallError::ProcedureNotFound)` - Nothing matches exactly. Names are case-sensitive
    ///   and never normalized.
    pub fn lookup(&self, service: &str, method: &str, encoding: &str) -> Result<&HandlerSpec, CallError> {
        let key = ProcedureKey::new(service, method, encoding);
        match self.state.procedures.get(&key) {
            Some(handler) => Ok(handler),
            None => Err(CallError::ProcedureNotFound(key)),
        }
    }
}
