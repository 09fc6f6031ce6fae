//! # Call Errors
//!
//! [`CallError`] is returned to the immediate caller of every per-call operation: adapters,
//! stream sessions, the dispatcher and typed callers. None of these errors are retried here;
//! [`CallError::kind`] classifies them so a retry layer above can decide.
//!
//! Business failures are [`ApplicationError`]s. On the wire they travel inside a structurally
//! successful response flagged as an application error, so the caller can still inspect the
//! structured details.
use crate::{
    BoxError,
    codec::{AnyMessage, CastError, CodecError, Encoding, Message},
    context::CancelReason,
    envelope::{APPLICATION_ERROR_MESSAGE_HEADER, APPLICATION_ERROR_NAME_HEADER, Response},
    handler::HandlerKind,
    registry::ProcedureKey,
    stream::Direction,
};
use bytes::Bytes;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("No procedure registered for {0}")]
    ProcedureNotFound(ProcedureKey),
    #[error("Procedure {key} is registered as a {actual} handler, not a {expected} handler")]
    UnexpectedHandler {
        key: ProcedureKey,
        expected: HandlerKind,
        actual: HandlerKind,
    },
    #[error("Internal error: '{0}'")]
    Cast(#[from] CastError),
    #[error("Encoding error: '{0}'")]
    Codec(#[from] CodecError),
    #[error("Stream is already closed for {0}")]
    StreamClosed(Direction),
    #[error("Call {0}")]
    Cancelled(CancelReason),
    #[error("Stream ended before the request message was received")]
    MissingRequest,
    #[error("Stream ended before the response message was received")]
    MissingResponse,
    #[error(transparent)]
    Application(#[from] ApplicationError),
    #[error("Remote peer failed the call: '{0}'")]
    Remote(String),
    #[error("Transport error: '{0}'")]
    Transport(#[source] BoxError),
}

/// Coarse classification of a [`CallError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No procedure matches the call.
    Unroutable,
    /// A framework invariant was violated (registry/handler mismatch).
    Internal,
    /// The payload could not be encoded or decoded, or a required message is missing.
    InvalidArgument,
    /// The stream side used by the operation already half-closed.
    StreamClosed,
    Cancelled,
    DeadlineExceeded,
    /// The handler reported a business failure.
    Application,
    /// The transport failed to carry the call.
    Unavailable,
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::ProcedureNotFound(_) => ErrorKind::Unroutable,
            CallError::UnexpectedHandler { .. }
            | CallError::Cast(_)
            | CallError::Remote(_)
            | CallError::MissingResponse => ErrorKind::Internal,
            CallError::Codec(_) | CallError::MissingRequest => ErrorKind::InvalidArgument,
            CallError::StreamClosed(_) => ErrorKind::StreamClosed,
            CallError::Cancelled(CancelReason::Cancelled) => ErrorKind::Cancelled,
            CallError::Cancelled(CancelReason::DeadlineExceeded) => ErrorKind::DeadlineExceeded,
            CallError::Application(_) => ErrorKind::Application,
            CallError::Transport(_) => ErrorKind::Unavailable,
        }
    }

    /// Only transport failures may succeed when attempted again unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }

    pub fn transport(err: impl Into<BoxError>) -> Self {
        CallError::Transport(err.into())
    }
}

#[derive(Debug, Clone)]
enum Details {
    Typed(Arc<dyn AnyMessage>),
    Encoded { encoding: Encoding, bytes: Bytes },
}

/// A business failure reported by a handler.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Application error '{name}': '{message}'")]
pub struct ApplicationError {
    name: String,
    message: String,
    details: Option<Details>,
}

impl ApplicationError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Attaches a structured payload, encoded with the call's encoding when sent.
    pub fn with_details<T: Message>(mut self, details: T) -> Self {
        self.details = Some(Details::Typed(Arc::new(details)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Decodes the structured payload, if any.
    pub fn details<T: Message>(&self) -> Result<Option<T>, CodecError> {
        match &self.details {
            None => Ok(None),
            Some(Details::Encoded { encoding, bytes }) => encoding.decode(bytes).map(Some),
            Some(Details::Typed(message)) => {
                let bytes = message.encode_as(Encoding::Proto)?;
                Encoding::Proto.decode(&bytes).map(Some)
            }
        }
    }

    /// Builds the application-error response carrying this error.
    pub fn into_response(self, encoding: Encoding) -> Result<Response, CodecError> {
        let body = match self.details {
            None => Bytes::new(),
            Some(Details::Typed(message)) => message.encode_as(encoding)?,
            Some(Details::Encoded { bytes, .. }) => bytes,
        };
        let mut response = Response::new(body);
        response.application_error = true;
        response.headers.insert(APPLICATION_ERROR_NAME_HEADER, self.name);
        response
            .headers
            .insert(APPLICATION_ERROR_MESSAGE_HEADER, self.message);
        Ok(response)
    }

    /// Reads the application error carried by a flagged response.
    pub fn from_response(response: &Response, encoding: Encoding) -> Self {
        let header = |name| response.headers.get(name).unwrap_or_default().to_string();
        Self {
            name: header(APPLICATION_ERROR_NAME_HEADER),
            message: header(APPLICATION_ERROR_MESSAGE_HEADER),
            details: (!response.body.is_empty()).then(|| Details::Encoded {
                encoding,
                bytes: response.body.clone(),
            }),
        }
    }
}
