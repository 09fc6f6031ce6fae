//! # Streaming Sessions
//!
//! A [`StreamSession`] is the message-sequencing primitive behind the three streaming shapes.
//! It wraps the transport's duplex [`MessageChannel`] and enforces the half-close protocol:
//!
//! ```text
//! Open ──close_send──▶ HalfClosedLocal ──end of stream──▶ Closed
//!   └───end of stream──▶ HalfClosedRemote ──close_send──▶ Closed
//! ```
//!
//! Transitions only move forward. Once both directions are closed the channel is dropped,
//! releasing the transport resource.
//!
//! Callers and handlers never see the session directly. Each shape gets a narrowed, typed
//! view ([`ClientStreamingCall`], [`ServerStreamingResponses`], ...) exposing only the
//! operations that shape allows.
use crate::{
    BoxFuture,
    codec::{Encoding, Message},
    context::CallContext,
    envelope::Response,
    error::{ApplicationError, CallError},
};
use bytes::Bytes;
use futures_util::Stream;
use std::{
    fmt,
    marker::PhantomData,
    ops::{Deref, DerefMut},
};

/// One direction of a stream, as seen from the local side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => f.write_str("sending"),
            Direction::Receive => f.write_str("receiving"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Both sides may still send.
    Open,
    /// The local side will not send anymore.
    HalfClosedLocal,
    /// The remote side finished sending.
    HalfClosedRemote,
    /// Neither side will send anymore.
    Closed,
}

impl StreamState {
    pub fn can_send(self) -> bool {
        matches!(self, StreamState::Open | StreamState::HalfClosedRemote)
    }

    pub fn can_recv(self) -> bool {
        matches!(self, StreamState::Open | StreamState::HalfClosedLocal)
    }

    fn close_local(self) -> Self {
        match self {
            StreamState::Open => StreamState::HalfClosedLocal,
            StreamState::HalfClosedRemote => StreamState::Closed,
            state => state,
        }
    }

    fn close_remote(self) -> Self {
        match self {
            StreamState::Open => StreamState::HalfClosedRemote,
            StreamState::HalfClosedLocal => StreamState::Closed,
            state => state,
        }
    }
}

/// A unit of data carried by a [`MessageChannel`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// An encoded message.
    Message(Bytes),
    /// The handler failed with an application error. Nothing follows.
    ApplicationError(Response),
    /// The peer failed the call for a framework reason. Nothing follows.
    Failure(String),
}

/// The duplex channel a transport provides for one streaming call.
///
/// Frames must be delivered in the order they were sent.
pub trait MessageChannel: Send + 'static {
    fn send(&mut self, frame: StreamFrame) -> BoxFuture<'_, Result<(), CallError>>;

    /// Receives the next frame. `Ok(None)` means the peer half-closed its sending side.
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<StreamFrame>, CallError>>;

    /// Signals the peer that no further frames will be sent.
    fn close_send(&mut self) -> BoxFuture<'_, Result<(), CallError>>;
}

/// The state machine driving one streaming call.
pub struct StreamSession {
    ctx: CallContext,
    encoding: Encoding,
    state: StreamState,
    channel: Option<Box<dyn MessageChannel>>,
}

impl StreamSession {
    pub fn new(ctx: CallContext, encoding: Encoding, channel: Box<dyn MessageChannel>) -> Self {
        Self {
            ctx,
            encoding,
            state: StreamState::Open,
            channel: Some(channel),
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn context(&self) -> &CallContext {
        &self.ctx
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub async fn send_frame(&mut self, frame: StreamFrame) -> Result<(), CallError> {
        if !self.state.can_send() {
            return Err(CallError::StreamClosed(Direction::Send));
        }
        let Some(channel) = self.channel.as_mut() else {
            return Err(CallError::StreamClosed(Direction::Send));
        };
        self.ctx.guard(channel.send(frame)).await?
    }

    /// Receives the next frame, `Ok(None)` once the remote side completed.
    pub async fn recv_frame(&mut self) -> Result<Option<StreamFrame>, CallError> {
        if !self.state.can_recv() {
            return Ok(None);
        }
        let Some(channel) = self.channel.as_mut() else {
            return Ok(None);
        };
        let frame = self.ctx.guard(channel.recv()).await??;
        match frame {
            Some(frame) => Ok(Some(frame)),
            None => {
                self.transition(self.state.close_remote());
                Ok(None)
            }
        }
    }

    /// Half-closes the local side. Closing twice fails with [`CallError::StreamClosed`].
    pub async fn close_send(&mut self) -> Result<(), CallError> {
        if !self.state.can_send() {
            return Err(CallError::StreamClosed(Direction::Send));
        }
        if let Some(channel) = self.channel.as_mut() {
            self.ctx.guard(channel.close_send()).await??;
        }
        self.transition(self.state.close_local());
        Ok(())
    }

    pub async fn send<T: Message>(&mut self, message: &T) -> Result<(), CallError> {
        let body = self.encoding.encode(message)?;
        self.send_frame(StreamFrame::Message(body)).await
    }

    /// Receives and decodes the next message, `Ok(None)` at end of stream.
    ///
    /// An error frame from the peer ends its side of the stream and surfaces as an error.
    pub async fn recv<T: Message>(&mut self) -> Result<Option<T>, CallError> {
        match self.recv_frame().await? {
            None => Ok(None),
            Some(StreamFrame::Message(body)) => Ok(Some(self.encoding.decode(&body)?)),
            Some(StreamFrame::ApplicationError(response)) => {
                self.transition(self.state.close_remote());
                Err(ApplicationError::from_response(&response, self.encoding).into())
            }
            Some(StreamFrame::Failure(message)) => {
                self.transition(self.state.close_remote());
                Err(CallError::Remote(message))
            }
        }
    }

    fn transition(&mut self, next: StreamState) {
        if next == self.state {
            return;
        }
        tracing::debug!(from = ?self.state, to = ?next, "Stream state transition");
        self.state = next;
        if next == StreamState::Closed {
            self.channel = None;
        }
    }
}

impl fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("encoding", &self.encoding)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// The serving side of a streaming call.
#[derive(Debug)]
pub struct ServerStream(StreamSession);

impl ServerStream {
    pub fn new(ctx: CallContext, encoding: Encoding, channel: Box<dyn MessageChannel>) -> Self {
        Self(StreamSession::new(ctx, encoding, channel))
    }

    /// Receives the single request of a server-streaming call.
    pub async fn recv_first<T: Message>(&mut self) -> Result<T, CallError> {
        self.0.recv().await?.ok_or(CallError::MissingRequest)
    }

    /// Reports a handler failure to the caller and closes the local side.
    pub async fn fail(&mut self, err: &CallError) -> Result<(), CallError> {
        if !self.state().can_send() {
            return Ok(());
        }
        let frame = match err {
            CallError::Application(app) => match app.clone().into_response(self.encoding()) {
                Ok(response) => StreamFrame::ApplicationError(response),
                Err(encode_err) => StreamFrame::Failure(encode_err.to_string()),
            },
            err => StreamFrame::Failure(err.to_string()),
        };
        self.0.send_frame(frame).await?;
        self.0.close_send().await
    }
}

impl Deref for ServerStream {
    type Target = StreamSession;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for ServerStream {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// The calling side of a streaming call.
#[derive(Debug)]
pub struct ClientStream(StreamSession);

impl ClientStream {
    pub fn new(ctx: CallContext, encoding: Encoding, channel: Box<dyn MessageChannel>) -> Self {
        Self(StreamSession::new(ctx, encoding, channel))
    }
}

impl Deref for ClientStream {
    type Target = StreamSession;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for ClientStream {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Caller view of a client-streaming call: many sends, then one response.
#[derive(Debug)]
pub struct ClientStreamingCall<Req, Res> {
    stream: ClientStream,
    _types: PhantomData<fn(Req) -> Res>,
}

impl<Req: Message, Res: Message> ClientStreamingCall<Req, Res> {
    pub fn new(stream: ClientStream) -> Self {
        Self {
            stream,
            _types: PhantomData,
        }
    }

    pub fn context(&self) -> &CallContext {
        self.stream.context()
    }

    pub async fn send(&mut self, request: &Req) -> Result<(), CallError> {
        self.stream.send(request).await
    }

    /// Half-closes the call and waits for the handler's single response.
    pub async fn close_and_recv(mut self) -> Result<Res, CallError> {
        self.stream.close_send().await?;
        self.stream.recv().await?.ok_or(CallError::MissingResponse)
    }
}

/// Caller view of a server-streaming call: the request is already sent.
#[derive(Debug)]
pub struct ServerStreamingCall<Res> {
    stream: ClientStream,
    _types: PhantomData<fn() -> Res>,
}

impl<Res: Message> ServerStreamingCall<Res> {
    pub fn new(stream: ClientStream) -> Self {
        Self {
            stream,
            _types: PhantomData,
        }
    }

    pub fn context(&self) -> &CallContext {
        self.stream.context()
    }

    pub async fn recv(&mut self) -> Result<Option<Res>, CallError> {
        self.stream.recv().await
    }

    pub async fn close_send(&mut self) -> Result<(), CallError> {
        self.stream.close_send().await
    }

    /// Turns the call into a stream of responses ending at the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Res, CallError>> + Send {
        futures_util::stream::unfold(Some(self), |call| async move {
            let mut call = call?;
            match call.recv().await {
                Ok(Some(message)) => Some((Ok(message), Some(call))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

/// Caller view of a bidirectional streaming call.
#[derive(Debug)]
pub struct BidiStreamingCall<Req, Res> {
    stream: ClientStream,
    _types: PhantomData<fn(Req) -> Res>,
}

impl<Req: Message, Res: Message> BidiStreamingCall<Req, Res> {
    pub fn new(stream: ClientStream) -> Self {
        Self {
            stream,
            _types: PhantomData,
        }
    }

    pub fn context(&self) -> &CallContext {
        self.stream.context()
    }

    pub async fn send(&mut self, request: &Req) -> Result<(), CallError> {
        self.stream.send(request).await
    }

    pub async fn recv(&mut self) -> Result<Option<Res>, CallError> {
        self.stream.recv().await
    }

    pub async fn close_send(&mut self) -> Result<(), CallError> {
        self.stream.close_send().await
    }
}

/// Handler view of a client-streaming call. The adapter sends the response.
#[derive(Debug)]
pub struct ClientStreamingRequests<'a, Req> {
    stream: &'a mut ServerStream,
    _types: PhantomData<fn() -> Req>,
}

impl<'a, Req: Message> ClientStreamingRequests<'a, Req> {
    pub fn new(stream: &'a mut ServerStream) -> Self {
        Self {
            stream,
            _types: PhantomData,
        }
    }

    pub fn context(&self) -> &CallContext {
        self.stream.context()
    }

    /// The next request, `Ok(None)` once the caller half-closed.
    pub async fn recv(&mut self) -> Result<Option<Req>, CallError> {
        self.stream.recv().await
    }
}

/// Handler view of a server-streaming call. The request was read by the adapter.
#[derive(Debug)]
pub struct ServerStreamingResponses<'a, Res> {
    stream: &'a mut ServerStream,
    _types: PhantomData<fn(Res)>,
}

impl<'a, Res: Message> ServerStreamingResponses<'a, Res> {
    pub fn new(stream: &'a mut ServerStream) -> Self {
        Self {
            stream,
            _types: PhantomData,
        }
    }

    pub fn context(&self) -> &CallContext {
        self.stream.context()
    }

    pub async fn send(&mut self, response: &Res) -> Result<(), CallError> {
        self.stream.send(response).await
    }
}

/// Handler view of a bidirectional streaming call.
#[derive(Debug)]
pub struct BidiStreamingServer<'a, Req, Res> {
    stream: &'a mut ServerStream,
    _types: PhantomData<fn(Req) -> Res>,
}

impl<'a, Req: Message, Res: Message> BidiStreamingServer<'a, Req, Res> {
    pub fn new(stream: &'a mut ServerStream) -> Self {
        Self {
            stream,
            _types: PhantomData,
        }
    }

    pub fn context(&self) -> &CallContext {
        self.stream.context()
    }

    pub async fn recv(&mut self) -> Result<Option<Req>, CallError> {
        self.stream.recv().await
    }

    pub async fn send(&mut self, response: &Res) -> Result<(), CallError> {
        self.stream.send(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::CancelReason, transport::memory::channel_pair};
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(default)]
    struct Tick {
        #[prost(uint32, tag = "1")]
        n: u32,
    }

    fn sessions(encoding: Encoding) -> (StreamSession, StreamSession) {
        let (local, remote) = channel_pair(8);
        (
            StreamSession::new(CallContext::new(), encoding, Box::new(local)),
            StreamSession::new(CallContext::new(), encoding, Box::new(remote)),
        )
    }

    #[tokio::test]
    async fn test_half_close_local_then_remote() {
        let (mut local, mut remote) = sessions(Encoding::Proto);

        local.close_send().await.unwrap();
        assert_eq!(local.state(), StreamState::HalfClosedLocal);
        assert!(matches!(
            local.send(&Tick { n: 1 }).await,
            Err(CallError::StreamClosed(Direction::Send))
        ));
        assert!(matches!(
            local.close_send().await,
            Err(CallError::StreamClosed(Direction::Send))
        ));

        assert_eq!(remote.recv::<Tick>().await.unwrap(), None);
        assert_eq!(remote.state(), StreamState::HalfClosedRemote);
        remote.close_send().await.unwrap();
        assert_eq!(remote.state(), StreamState::Closed);

        assert_eq!(local.recv::<Tick>().await.unwrap(), None);
        assert_eq!(local.state(), StreamState::Closed);
        assert!(local.channel.is_none());

        assert_eq!(local.recv::<Tick>().await.unwrap(), None);
        assert_eq!(local.state(), StreamState::Closed);
    }

    #[tokio::test]
    async fn test_messages_arrive_in_order() {
        let (mut local, mut remote) = sessions(Encoding::Json);

        for n in 0..5 {
            local.send(&Tick { n }).await.unwrap();
        }
        local.close_send().await.unwrap();

        let mut received = Vec::new();
        while let Some(tick) = remote.recv::<Tick>().await.unwrap() {
            received.push(tick.n);
        }
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_pending_recv_is_cancelled() {
        let (local, _remote) = channel_pair(8);
        let ctx = CallContext::new();
        let mut session = StreamSession::new(ctx.clone(), Encoding::Proto, Box::new(local));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ctx.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(1), session.recv::<Tick>())
            .await
            .expect("recv did not observe cancellation");

        assert!(matches!(
            result,
            Err(CallError::Cancelled(CancelReason::Cancelled))
        ));
        assert_eq!(session.state(), StreamState::Open);
    }

    #[tokio::test]
    async fn test_failure_frame_ends_the_remote_side() {
        let (local, remote) = channel_pair(8);
        let mut server = ServerStream::new(CallContext::new(), Encoding::Proto, Box::new(local));
        let mut client = ClientStream::new(CallContext::new(), Encoding::Proto, Box::new(remote));

        let err = CallError::from(ApplicationError::new("Quota", "too many ticks"));
        server.fail(&err).await.unwrap();
        assert_eq!(server.state(), StreamState::HalfClosedLocal);

        match client.recv::<Tick>().await {
            Err(CallError::Application(app)) => {
                assert_eq!(app.name(), "Quota");
                assert_eq!(app.message(), "too many ticks");
            }
            other => panic!("expected an application error, got {other:?}"),
        }
        assert_eq!(client.state(), StreamState::HalfClosedRemote);
        assert_eq!(client.recv::<Tick>().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_recv_first_requires_a_request() {
        let (local, mut remote) = channel_pair(8);
        let mut server = ServerStream::new(CallContext::new(), Encoding::Proto, Box::new(local));
        remote.close_send().await.unwrap();

        assert!(matches!(
            server.recv_first::<Tick>().await,
            Err(CallError::MissingRequest)
        ));
    }
}
