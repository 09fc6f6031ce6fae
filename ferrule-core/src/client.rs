//! # Typed Caller
//!
//! [`Client`] is what generated client stubs are built on. For every call it encodes the
//! request with the configured [`Encoding`], wraps it in a [`Request`] envelope, hands it to
//! the [`Outbound`] transport under the call's deadline and decodes the response.
//!
//! A response flagged as an application error is surfaced as [`CallError::Application`], with
//! the handler's structured details still decodable.
use crate::{
    codec::{Encoding, Message},
    context::CallContext,
    envelope::{Ack, Headers, Request},
    error::{ApplicationError, CallError},
    stream::{BidiStreamingCall, ClientStream, ClientStreamingCall, ServerStreamingCall},
    transport::Outbound,
};
use bytes::Bytes;
use std::{fmt, sync::Arc};

/// Caller name used when none is configured.
pub const DEFAULT_CALLER: &str = "ferrule";

/// How a [`Client`] reaches its service.
#[derive(Clone)]
pub struct ClientConfig {
    pub outbound: Arc<dyn Outbound>,
    /// Encoding of every request sent by the client.
    pub encoding: Encoding,
    /// Name of the calling service, sent with every request.
    pub caller: String,
}

impl ClientConfig {
    pub fn new(outbound: Arc<dyn Outbound>) -> Self {
        Self {
            outbound,
            encoding: Encoding::default(),
            caller: DEFAULT_CALLER.to_string(),
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = caller.into();
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("encoding", &self.encoding)
            .field("caller", &self.caller)
            .finish_non_exhaustive()
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub headers: Headers,
}

impl CallOptions {
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }
}

/// A typed caller bound to one service.
#[derive(Debug, Clone)]
pub struct Client {
    service: String,
    config: ClientConfig,
}

impl Client {
    pub fn new(service: impl Into<String>, config: ClientConfig) -> Self {
        Self {
            service: service.into(),
            config,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn encoding(&self) -> Encoding {
        self.config.encoding
    }

    fn request(&self, method: &str, body: Bytes, options: CallOptions) -> Request {
        Request {
            caller: self.config.caller.clone(),
            service: self.service.clone(),
            method: method.to_string(),
            encoding: self.config.encoding.name().to_string(),
            headers: options.headers,
            body,
        }
    }

    /// Performs a unary call.
    ///
    /// # Returns
    ///
    /// * `Ok(Res)` - The decoded response.
    /// * `Err(CallError::Application)` - The handler reported a business failure.
    /// * `Err(CallError::Cancelled)` - The deadline elapsed or the call was cancelled first.
    pub async fn call<Req: Message, Res: Message>(
        &self,
        ctx: &CallContext,
        method: &str,
        request: &Req,
        options: CallOptions,
    ) -> Result<Res, CallError> {
        let encoding = self.config.encoding;
        let request = self.request(method, encoding.encode(request)?, options);

        let response = ctx
            .guard(self.config.outbound.call(ctx.clone(), request))
            .await??;

        if response.application_error {
            return Err(ApplicationError::from_response(&response, encoding).into());
        }
        Ok(encoding.decode(&response.body)?)
    }

    /// Performs a oneway call, resolving once the transport accepted the request.
    pub async fn call_oneway<Req: Message>(
        &self,
        ctx: &CallContext,
        method: &str,
        request: &Req,
        options: CallOptions,
    ) -> Result<Ack, CallError> {
        let request = self.request(method, self.config.encoding.encode(request)?, options);
        ctx.guard(self.config.outbound.call_oneway(ctx.clone(), request))
            .await?
    }

    /// Opens a raw stream to `method`.
    pub async fn call_stream(
        &self,
        ctx: &CallContext,
        method: &str,
        options: CallOptions,
    ) -> Result<ClientStream, CallError> {
        let request = self.request(method, Bytes::new(), options);
        let channel = ctx
            .guard(self.config.outbound.open_stream(ctx.clone(), request))
            .await??;
        Ok(ClientStream::new(ctx.clone(), self.config.encoding, channel))
    }

    pub async fn client_streaming<Req: Message, Res: Message>(
        &self,
        ctx: &CallContext,
        method: &str,
        options: CallOptions,
    ) -> Result<ClientStreamingCall<Req, Res>, CallError> {
        let stream = self.call_stream(ctx, method, options).await?;
        Ok(ClientStreamingCall::new(stream))
    }

    /// Opens a server-streaming call and sends its single request.
    pub async fn server_streaming<Req: Message, Res: Message>(
        &self,
        ctx: &CallContext,
        method: &str,
        request: &Req,
        options: CallOptions,
    ) -> Result<ServerStreamingCall<Res>, CallError> {
        let mut stream = self.call_stream(ctx, method, options).await?;
        stream.send(request).await?;
        Ok(ServerStreamingCall::new(stream))
    }

    pub async fn bidi_streaming<Req: Message, Res: Message>(
        &self,
        ctx: &CallContext,
        method: &str,
        options: CallOptions,
    ) -> Result<BidiStreamingCall<Req, Res>, CallError> {
        let stream = self.call_stream(ctx, method, options).await?;
        Ok(BidiStreamingCall::new(stream))
    }
}
