//! # Call Context
//!
//! Every call carries a [`CallContext`]: an optional absolute deadline and a cooperative
//! cancellation signal. Blocking operations (stream receives, outbound calls, handler
//! invocations) race their work against [`CallContext::done`] through [`CallContext::guard`]
//! and return [`CallError::Cancelled`] instead of hanging.
use crate::{envelope::Headers, error::CallError};
use std::{fmt, future::Future, sync::Arc, time::Duration};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a call stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The call's deadline elapsed.
    DeadlineExceeded,
    /// The cancellation signal was triggered explicitly.
    Cancelled,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::DeadlineExceeded => f.write_str("deadline exceeded"),
            CancelReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Metadata of the inbound call a handler is serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCall {
    pub caller: String,
    pub service: String,
    pub method: String,
    pub encoding: String,
    pub headers: Headers,
}

/// Deadline, cancellation and inbound-call metadata for one call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    token: CancellationToken,
    call: Option<Arc<InboundCall>>,
}

impl CallContext {
    /// A context without deadline that is only cancelled explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an absolute deadline, keeping the earlier one if a deadline is already set.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Sets a deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Uses an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub(crate) fn with_call(mut self, call: InboundCall) -> Self {
        self.call = Some(Arc::new(call));
        self
    }

    /// Derives a context sharing this deadline whose cancellation is also triggered by the
    /// parent's, but can be cancelled on its own without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            deadline: self.deadline,
            token: self.token.child_token(),
            call: self.call.clone(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// The inbound call being served, set by the handler adapters.
    pub fn call(&self) -> Option<&InboundCall> {
        self.call.as_deref()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Triggers the cancellation signal.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns the reason if the call should stop now.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the deadline elapses or the call is cancelled.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => CancelReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }

    /// Runs `future` unless the call is cancelled first.
    pub async fn guard<F>(&self, future: F) -> Result<F::Output, CallError>
    where
        F: Future,
    {
        if let Some(reason) = self.cancel_reason() {
            return Err(CallError::Cancelled(reason));
        }
        tokio::select! {
            biased;
            reason = self.done() => Err(CallError::Cancelled(reason)),
            output = future => Ok(output),
        }
    }
}
