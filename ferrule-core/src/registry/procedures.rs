use crate::{
    codec::Encoding,
    handler::{OnewayHandler, StreamHandler, UnaryHandler},
    registry::{HandlerSpec, Procedure},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct UnaryHandlerEntry {
    pub method_name: String,
    pub handler: Arc<dyn UnaryHandler>,
}

#[derive(Clone)]
pub struct OnewayHandlerEntry {
    pub method_name: String,
    pub handler: Arc<dyn OnewayHandler>,
}

#[derive(Clone)]
pub struct StreamHandlerEntry {
    pub method_name: String,
    pub handler: Arc<dyn StreamHandler>,
}

/// The handlers of one service, grouped by handler family.
#[derive(Clone)]
pub struct BuildProceduresParams {
    pub service_name: String,
    pub unary_handlers: Vec<UnaryHandlerEntry>,
    pub oneway_handlers: Vec<OnewayHandlerEntry>,
    pub stream_handlers: Vec<StreamHandlerEntry>,
}

impl BuildProceduresParams {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            unary_handlers: Vec::new(),
            oneway_handlers: Vec::new(),
            stream_handlers: Vec::new(),
        }
    }
}

/// Expands the handlers of a service into one [`Procedure`] per handler and per supported
/// [`Encoding`].
///
/// N unary, O oneway and M stream handlers yield exactly `2 * (N + O + M)` procedures, in
/// the order the handlers were given.
pub fn build_procedures(params: BuildProceduresParams) -> Vec<Procedure> {
    let BuildProceduresParams {
        service_name,
        unary_handlers,
        oneway_handlers,
        stream_handlers,
    } = params;

    let handlers = unary_handlers
        .into_iter()
        .map(|e| (e.method_name, HandlerSpec::Unary(e.handler)))
        .chain(
            oneway_handlers
                .into_iter()
                .map(|e| (e.method_name, HandlerSpec::Oneway(e.handler))),
        )
        .chain(
            stream_handlers
                .into_iter()
                .map(|e| (e.method_name, HandlerSpec::Stream(e.handler))),
        );

    let mut procedures = Vec::new();
    for (method, handler) in handlers {
        for encoding in Encoding::ALL {
            procedures.push(Procedure {
                service: service_name.clone(),
                method: method.clone(),
                encoding,
                handler: handler.clone(),
            });
        }
    }
    procedures
}
