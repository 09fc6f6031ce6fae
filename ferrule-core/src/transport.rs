//! # Transport Boundary
//!
//! The core does not move bytes. On the calling side a transport implements [`Outbound`]; on
//! the serving side it hands inbound calls to a [`crate::dispatch::Dispatcher`]. Streaming
//! calls travel over a [`MessageChannel`] the transport provides.
//!
//! Two in-process implementations ship with the crate:
//!
//! * [`memory`]: bounded duplex channels built on `tokio::sync::mpsc`.
//! * [`Loopback`]: an [`Outbound`] that dispatches straight into a local dispatcher.
mod loopback;
pub mod memory;

pub use loopback::Loopback;

use crate::{
    BoxFuture,
    context::CallContext,
    envelope::{Ack, Request, Response},
    error::CallError,
    stream::MessageChannel,
};

/// The calling side of a transport.
///
/// Implementations must honour the context's deadline and cancellation. Failures to reach
/// the peer are reported as [`CallError::Transport`]; retries are left to the transport.
pub trait Outbound: Send + Sync + 'static {
    /// Sends a unary request and waits for its response.
    fn call(&self, ctx: CallContext, request: Request) -> BoxFuture<'_, Result<Response, CallError>>;

    /// Hands a oneway request to the transport. Resolves once the transport accepted it.
    fn call_oneway(&self, ctx: CallContext, request: Request) -> BoxFuture<'_, Result<Ack, CallError>>;

    /// Opens a stream described by `request` (its body is empty).
    fn open_stream(
        &self,
        ctx: CallContext,
        request: Request,
    ) -> BoxFuture<'_, Result<Box<dyn MessageChannel>, CallError>>;
}
