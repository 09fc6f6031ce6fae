//! # Handler Adapters
//!
//! Business handlers are written against concrete message types. The registry, however, only
//! deals in envelopes. This module bridges the two in two layers:
//!
//! 1. **Typed glue** ([`UnaryMethod`], [`OnewayMethod`], [`StreamMethod`]): receives an already
//!    decoded, type-erased message and recovers its concrete type. Generated code implements
//!    these per method; [`unary_fn`] and [`oneway_fn`] wrap plain async closures.
//! 2. **Envelope handlers** ([`UnaryHandler`], [`OnewayHandler`], [`StreamHandler`]): what the
//!    registry stores. The adapters here implement them on top of the typed glue:
//!    read the call metadata, decode through the method's [`MessageFactory`], invoke, encode.
use crate::{
    BoxFuture,
    codec::{AnyMessage, Encoding, Message, MessageFactory, downcast},
    context::{CallContext, InboundCall},
    envelope::{Request, Response},
    error::CallError,
    shape::CallingShape,
    stream::{MessageChannel, ServerStream, StreamFrame},
};
use std::{fmt, future::Future, marker::PhantomData, sync::Arc};

/// The envelope-level handler families a procedure can be registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Unary,
    Oneway,
    Stream,
}

impl HandlerKind {
    /// The handler family serving a calling shape.
    pub fn for_shape(shape: CallingShape) -> Self {
        match shape {
            CallingShape::Unary => HandlerKind::Unary,
            CallingShape::Oneway => HandlerKind::Oneway,
            CallingShape::ClientStreaming
            | CallingShape::ServerStreaming
            | CallingShape::BidiStreaming => HandlerKind::Stream,
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Unary => f.write_str("unary"),
            HandlerKind::Oneway => f.write_str("oneway"),
            HandlerKind::Stream => f.write_str("stream"),
        }
    }
}

/// Typed glue of a unary method.
pub trait UnaryMethod: Send + Sync + 'static {
    fn call(
        &self,
        ctx: CallContext,
        request: Box<dyn AnyMessage>,
    ) -> BoxFuture<'_, Result<Box<dyn AnyMessage>, CallError>>;
}

/// Typed glue of a oneway method.
pub trait OnewayMethod: Send + Sync + 'static {
    fn call(&self, ctx: CallContext, request: Box<dyn AnyMessage>)
    -> BoxFuture<'_, Result<(), CallError>>;
}

/// Typed glue of a streaming method.
///
/// Server-streaming glue reads the single request before invoking the business handler;
/// client-streaming glue sends the single response the handler returns.
pub trait StreamMethod: Send + Sync + 'static {
    fn call<'a>(&'a self, stream: &'a mut ServerStream) -> BoxFuture<'a, Result<(), CallError>>;
}

/// A [`UnaryMethod`] backed by an async closure.
pub struct UnaryFn<F, Req, Res> {
    f: F,
    _types: PhantomData<fn(Req) -> Res>,
}

pub fn unary_fn<F, Fut, Req, Res>(f: F) -> UnaryFn<F, Req, Res>
where
    F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, CallError>> + Send + 'static,
    Req: Message,
    Res: Message,
{
    UnaryFn {
        f,
        _types: PhantomData,
    }
}

impl<F, Fut, Req, Res> UnaryMethod for UnaryFn<F, Req, Res>
where
    F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, CallError>> + Send + 'static,
    Req: Message,
    Res: Message,
{
    fn call(
        &self,
        ctx: CallContext,
        request: Box<dyn AnyMessage>,
    ) -> BoxFuture<'_, Result<Box<dyn AnyMessage>, CallError>> {
        Box::pin(async move {
            let request = downcast::<Req>(request)?;
            let response = (self.f)(ctx, request).await?;
            Ok(Box::new(response) as Box<dyn AnyMessage>)
        })
    }
}

/// A [`OnewayMethod`] backed by an async closure.
pub struct OnewayFn<F, Req> {
    f: F,
    _types: PhantomData<fn(Req)>,
}

pub fn oneway_fn<F, Fut, Req>(f: F) -> OnewayFn<F, Req>
where
    F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CallError>> + Send + 'static,
    Req: Message,
{
    OnewayFn {
        f,
        _types: PhantomData,
    }
}

impl<F, Fut, Req> OnewayMethod for OnewayFn<F, Req>
where
    F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CallError>> + Send + 'static,
    Req: Message,
{
    fn call(
        &self,
        ctx: CallContext,
        request: Box<dyn AnyMessage>,
    ) -> BoxFuture<'_, Result<(), CallError>> {
        Box::pin(async move {
            let request = downcast::<Req>(request)?;
            (self.f)(ctx, request).await
        })
    }
}

/// Serves unary calls at the envelope level.
pub trait UnaryHandler: Send + Sync + 'static {
    fn handle(&self, ctx: CallContext, request: Request) -> BoxFuture<'_, Result<Response, CallError>>;
}

/// The handler run of an accepted oneway call, detached from the caller.
pub type OnewayInvocation = BoxFuture<'static, Result<(), CallError>>;

/// Serves oneway calls at the envelope level.
///
/// Accepting reads and decodes the call up front, so a malformed call is rejected before the
/// caller is acknowledged. Only the returned invocation runs the business handler.
pub trait OnewayHandler: Send + Sync + 'static {
    fn accept_oneway(self: Arc<Self>, ctx: CallContext, request: Request) -> Result<OnewayInvocation, CallError>;
}

/// Serves streaming calls over the transport's message channel.
///
/// `request` is the stream opening envelope; its body is ignored.
pub trait StreamHandler: Send + Sync + 'static {
    fn handle_stream(
        &self,
        ctx: CallContext,
        request: Request,
        channel: Box<dyn MessageChannel>,
    ) -> BoxFuture<'_, Result<(), CallError>>;
}

/// Resolves the call's encoding and attaches the inbound call metadata to the context.
fn read_request(ctx: CallContext, request: &Request) -> Result<(CallContext, Encoding), CallError> {
    let encoding = request.encoding.parse::<Encoding>()?;
    let call = InboundCall {
        caller: request.caller.clone(),
        service: request.service.clone(),
        method: request.method.clone(),
        encoding: request.encoding.clone(),
        headers: request.headers.clone(),
    };
    Ok((ctx.with_call(call), encoding))
}

pub struct UnaryAdapter<M> {
    method: M,
    new_request: MessageFactory,
}

impl<M: UnaryMethod> UnaryHandler for UnaryAdapter<M> {
    fn handle(&self, ctx: CallContext, request: Request) -> BoxFuture<'_, Result<Response, CallError>> {
        Box::pin(async move {
            let (ctx, encoding) = read_request(ctx, &request)?;
            let message = self.new_request.decode(encoding, &request.body)?;

            match ctx.guard(self.method.call(ctx.clone(), message)).await? {
                Ok(response) => Ok(Response::new(response.encode_as(encoding)?)),
                Err(CallError::Application(err)) => Ok(err.into_response(encoding)?),
                Err(err) => Err(err),
            }
        })
    }
}

pub struct OnewayAdapter<M> {
    method: M,
    new_request: MessageFactory,
}

impl<M: OnewayMethod> OnewayHandler for OnewayAdapter<M> {
    fn accept_oneway(self: Arc<Self>, ctx: CallContext, request: Request) -> Result<OnewayInvocation, CallError> {
        let (ctx, encoding) = read_request(ctx, &request)?;
        let message = self.new_request.decode(encoding, &request.body)?;
        Ok(Box::pin(async move {
            ctx.guard(self.method.call(ctx.clone(), message)).await?
        }))
    }
}

pub struct StreamAdapter<M> {
    method: M,
}

impl<M: StreamMethod> StreamHandler for StreamAdapter<M> {
    fn handle_stream(
        &self,
        ctx: CallContext,
        request: Request,
        mut channel: Box<dyn MessageChannel>,
    ) -> BoxFuture<'_, Result<(), CallError>> {
        Box::pin(async move {
            let (ctx, encoding) = match read_request(ctx, &request) {
                Ok(read) => read,
                Err(err) => {
                    if let Err(report_err) = channel.send(StreamFrame::Failure(err.to_string())).await {
                        tracing::debug!(%report_err, "Failed to report rejected stream");
                    }
                    return Err(err);
                }
            };

            let mut stream = ServerStream::new(ctx.clone(), encoding, channel);
            let result = ctx
                .guard(self.method.call(&mut stream))
                .await
                .and_then(|result| result);

            match result {
                Ok(()) if stream.state().can_send() => stream.close_send().await,
                Ok(()) => Ok(()),
                Err(err) => {
                    if let Err(report_err) = stream.fail(&err).await {
                        tracing::debug!(%report_err, "Failed to report stream handler error");
                    }
                    Err(err)
                }
            }
        })
    }
}

pub struct UnaryHandlerParams<M> {
    pub handle: M,
    pub new_request: MessageFactory,
}

pub struct OnewayHandlerParams<M> {
    pub handle: M,
    pub new_request: MessageFactory,
}

pub fn new_unary_handler<M: UnaryMethod>(params: UnaryHandlerParams<M>) -> Arc<dyn UnaryHandler> {
    Arc::new(UnaryAdapter {
        method: params.handle,
        new_request: params.new_request,
    })
}

pub fn new_oneway_handler<M: OnewayMethod>(params: OnewayHandlerParams<M>) -> Arc<dyn OnewayHandler> {
    Arc::new(OnewayAdapter {
        method: params.handle,
        new_request: params.new_request,
    })
}

pub fn new_stream_handler<M: StreamMethod>(method: M) -> Arc<dyn StreamHandler> {
    Arc::new(StreamAdapter { method })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::CodecError,
        envelope::{APPLICATION_ERROR_NAME_HEADER, Headers},
        error::ApplicationError,
    };
    use bytes::Bytes;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(default)]
    struct Ping {
        #[prost(string, tag = "1")]
        text: String,
    }

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(default)]
    struct Pong {
        #[prost(string, tag = "1")]
        text: String,
        #[prost(string, tag = "2")]
        caller: String,
    }

    fn request(encoding: Encoding, ping: &Ping) -> Request {
        Request {
            caller: "tester".to_string(),
            service: "test.Pinger".to_string(),
            method: "Ping".to_string(),
            encoding: encoding.name().to_string(),
            headers: Headers::new(),
            body: encoding.encode(ping).unwrap(),
        }
    }

    fn pinger() -> Arc<dyn UnaryHandler> {
        new_unary_handler(UnaryHandlerParams {
            handle: unary_fn(|ctx: CallContext, ping: Ping| async move {
                if ping.text.is_empty() {
                    return Err(CallError::from(ApplicationError::new(
                        "Empty",
                        "nothing to echo",
                    )));
                }
                let caller = ctx.call().map(|call| call.caller.clone()).unwrap_or_default();
                Ok(Pong {
                    text: ping.text,
                    caller,
                })
            }),
            new_request: MessageFactory::of::<Ping>(),
        })
    }

    #[tokio::test]
    async fn test_unary_adapter_decodes_invokes_and_encodes() {
        let ping = Ping {
            text: "hello".to_string(),
        };

        for encoding in Encoding::ALL {
            let response = pinger()
                .handle(CallContext::new(), request(encoding, &ping))
                .await
                .unwrap();

            assert!(!response.application_error);
            let pong: Pong = encoding.decode(&response.body).unwrap();
            assert_eq!(pong.text, "hello");
            assert_eq!(pong.caller, "tester");
        }
    }

    #[tokio::test]
    async fn test_application_error_is_a_flagged_response() {
        let response = pinger()
            .handle(CallContext::new(), request(Encoding::Json, &Ping::default()))
            .await
            .unwrap();

        assert!(response.application_error);
        assert_eq!(response.headers.get(APPLICATION_ERROR_NAME_HEADER), Some("Empty"));
    }

    #[tokio::test]
    async fn test_unknown_encoding_is_rejected_before_decoding() {
        let mut request = request(Encoding::Proto, &Ping::default());
        request.encoding = "xml".to_string();

        let result = pinger().handle(CallContext::new(), request).await;

        assert!(matches!(
            result,
            Err(CallError::Codec(CodecError::UnsupportedEncoding(name))) if name == "xml"
        ));
    }

    #[tokio::test]
    async fn test_factory_mismatch_is_a_cast_error() {
        let handler = new_unary_handler(UnaryHandlerParams {
            handle: unary_fn(|_ctx: CallContext, ping: Ping| async move {
                Ok::<_, CallError>(Pong {
                    text: ping.text,
                    caller: String::new(),
                })
            }),
            new_request: MessageFactory::of::<Pong>(),
        });

        let mut request = request(Encoding::Proto, &Ping::default());
        request.body = Bytes::new();
        let result = handler.handle(CallContext::new(), request).await;

        match result {
            Err(CallError::Cast(err)) => {
                assert_eq!(err.expected, std::any::type_name::<Ping>());
                assert_eq!(err.actual, std::any::type_name::<Pong>());
            }
            other => panic!("expected a cast error, got {other:?}"),
        }
    }

    #[test]
    fn test_handler_kind_per_shape() {
        let kinds: Vec<_> = CallingShape::ALL
            .into_iter()
            .map(HandlerKind::for_shape)
            .collect();

        assert_eq!(
            kinds,
            vec![
                HandlerKind::Unary,
                HandlerKind::Oneway,
                HandlerKind::Stream,
                HandlerKind::Stream,
                HandlerKind::Stream
            ]
        );
    }
}
