use crate::{
    codec::Encoding,
    handler::{HandlerKind, OnewayHandler, StreamHandler, UnaryHandler},
};
use std::{fmt, sync::Arc};

/// The unique key of a procedure.
///
/// Keys are compared exactly: no case folding, no trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcedureKey {
    /// Fully qualified service name (e.g. `kv.KeyValue`).
    pub service: String,
    /// Method name (e.g. `GetValue`).
    pub method: String,
    /// Encoding name (e.g. `json`).
    pub encoding: String,
}

impl ProcedureKey {
    pub fn new(
        service: impl Into<String>,
        method: impl Into<String>,
        encoding: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            encoding: encoding.into(),
        }
    }
}

impl fmt::Display for ProcedureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} [{}]", self.service, self.method, self.encoding)
    }
}

/// The envelope-level handler of a procedure.
#[derive(Clone)]
pub enum HandlerSpec {
    Unary(Arc<dyn UnaryHandler>),
    Oneway(Arc<dyn OnewayHandler>),
    Stream(Arc<dyn StreamHandler>),
}

impl HandlerSpec {
    pub fn kind(&self) -> HandlerKind {
        match self {
            HandlerSpec::Unary(_) => HandlerKind::Unary,
            HandlerSpec::Oneway(_) => HandlerKind::Oneway,
            HandlerSpec::Stream(_) => HandlerKind::Stream,
        }
    }
}

impl fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerSpec").field(&self.kind()).finish()
    }
}

/// A handler bound to a service, method and encoding, ready to be registered.
#[derive(Debug, Clone)]
pub struct Procedure {
    pub service: String,
    pub method: String,
    pub encoding: Encoding,
    pub handler: HandlerSpec,
}

impl Procedure {
    pub fn key(&self) -> ProcedureKey {
        ProcedureKey::new(&self.service, &self.method, self.encoding.name())
    }
}
