use super::{
    Outbound,
    memory::{DEFAULT_STREAM_CAPACITY, channel_pair},
};
use crate::{
    BoxFuture,
    context::CallContext,
    dispatch::Dispatcher,
    envelope::{Ack, Request, Response},
    error::CallError,
    stream::MessageChannel,
};

/// An [`Outbound`] that serves calls in-process through a [`Dispatcher`].
///
/// Oneway calls are routed and decoded before they are acknowledged. Their handlers and stream
/// handlers run on spawned tasks, so a Tokio runtime is required.
#[derive(Debug, Clone)]
pub struct Loopback {
    dispatcher: Dispatcher,
    stream_capacity: usize,
}

impl Loopback {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
        }
    }

    /// Sets how many frames each stream direction buffers.
    pub fn with_stream_capacity(mut self, capacity: usize) -> Self {
        self.stream_capacity = capacity;
        self
    }
}

impl Outbound for Loopback {
    fn call(&self, ctx: CallContext, request: Request) -> BoxFuture<'_, Result<Response, CallError>> {
        Box::pin(self.dispatcher.dispatch_unary(ctx, request))
    }

    fn call_oneway(&self, ctx: CallContext, request: Request) -> BoxFuture<'_, Result<Ack, CallError>> {
        let procedure = format!("{}/{}", request.service, request.method);
        let accepted = self.dispatcher.accept_oneway(ctx, request);
        Box::pin(async move {
            let invocation = accepted?;
            tokio::spawn(async move {
                if let Err(err) = invocation.await {
                    tracing::warn!(%procedure, %err, "Oneway handler failed");
                }
            });
            Ok(Ack)
        })
    }

    fn open_stream(
        &self,
        ctx: CallContext,
        request: Request,
    ) -> BoxFuture<'_, Result<Box<dyn MessageChannel>, CallError>> {
        let (client, server) = channel_pair(self.stream_capacity);
        let dispatcher = self.dispatcher.clone();
        Box::pin(async move {
            tokio::spawn(async move {
                let procedure = format!("{}/{}", request.service, request.method);
                if let Err(err) = dispatcher.dispatch_stream(ctx, request, Box::new(server)).await {
                    tracing::debug!(%procedure, %err, "Stream handler ended with an error");
                }
            });
            Ok(Box::new(client) as Box<dyn MessageChannel>)
        })
    }
}
