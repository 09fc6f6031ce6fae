//! # Dispatcher
//!
//! The entry point transports call for inbound traffic. The [`Dispatcher`] routes every call
//! through a sealed [`ProcedureRegistry`] by its exact `(service, method, encoding)` triple and
//! checks that the registered handler family matches the kind of call that arrived.
//!
//! Many calls may be dispatched concurrently; the registry is shared read-only.
use crate::{
    context::CallContext,
    envelope::{Request, Response},
    error::CallError,
    handler::{HandlerKind, OnewayInvocation},
    registry::{HandlerSpec, ProcedureKey, ProcedureRegistry, Sealed},
    stream::{MessageChannel, StreamFrame},
};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ProcedureRegistry<Sealed>>,
}

impl Dispatcher {
    pub fn new(registry: ProcedureRegistry<Sealed>) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ProcedureRegistry<Sealed> {
        &self.registry
    }

    fn route(&self, request: &Request) -> Result<&HandlerSpec, CallError> {
        let handler = self
            .registry
            .lookup(&request.service, &request.method, &request.encoding)?;

        tracing::debug!(
            caller = %request.caller,
            service = %request.service,
            method = %request.method,
            encoding = %request.encoding,
            kind = %handler.kind(),
            "Dispatching call"
        );
        Ok(handler)
    }

    /// Serves a unary call.
    pub async fn dispatch_unary(&self, ctx: CallContext, request: Request) -> Result<Response, CallError> {
        match self.route(&request)? {
            HandlerSpec::Unary(handler) => handler.handle(ctx, request).await,
            other => Err(unexpected(&request, HandlerKind::Unary, other.kind())),
        }
    }

    /// Routes and decodes a oneway call without running its handler.
    ///
    /// Routing, encoding and decoding failures are returned here; the caller is acknowledged
    /// only once this succeeds.
    pub fn accept_oneway(&self, ctx: CallContext, request: Request) -> Result<OnewayInvocation, CallError> {
        match self.route(&request)? {
            HandlerSpec::Oneway(handler) => Arc::clone(handler).accept_oneway(ctx, request),
            other => Err(unexpected(&request, HandlerKind::Oneway, other.kind())),
        }
    }

    /// Serves a oneway call to completion.
    pub async fn dispatch_oneway(&self, ctx: CallContext, request: Request) -> Result<(), CallError> {
        self.accept_oneway(ctx, request)?.await
    }

    /// Serves a streaming call over `channel`.
    ///
    /// A call that cannot be routed is reported to the peer as a failure frame before the
    /// error is returned.
    pub async fn dispatch_stream(
        &self,
        ctx: CallContext,
        request: Request,
        mut channel: Box<dyn MessageChannel>,
    ) -> Result<(), CallError> {
        let routed = match self.route(&request) {
            Ok(HandlerSpec::Stream(handler)) => Ok(handler),
            Ok(other) => Err(unexpected(&request, HandlerKind::Stream, other.kind())),
            Err(err) => Err(err),
        };
        match routed {
            Ok(handler) => handler.handle_stream(ctx, request, channel).await,
            Err(err) => {
                if let Err(report_err) = channel.send(StreamFrame::Failure(err.to_string())).await {
                    tracing::debug!(%report_err, "Failed to report unroutable stream");
                }
                Err(err)
            }
        }
    }
}

fn unexpected(request: &Request, expected: HandlerKind, actual: HandlerKind) -> CallError {
    CallError::UnexpectedHandler {
        key: ProcedureKey::new(&request.service, &request.method, &request.encoding),
        expected,
        actual,
    }
}
