//! # Ferrule Core
//!
//! `ferrule-core` is the dispatch and wire-encoding core of the ferrule RPC framework. It lets a
//! service expose typed procedures (unary, oneway and the three streaming shapes) under every
//! supported wire encoding, while the byte transport stays an external collaborator.
//!
//! ## Key Components
//!
//! * **[`shape::classify`]:** Assigns every method descriptor exactly one [`CallingShape`].
//! * **[`registry::ProcedureRegistry`]:** Maps a `(service, method, encoding)` triple to a handler.
//!   It uses a **Typestate Pattern**: procedures are registered while the registry is
//!   [`registry::Building`] and looked up once it is [`registry::Sealed`].
//! * **[`handler`]:** Adapters turning typed business handlers into envelope-level handlers.
//! * **[`stream::StreamSession`]:** The half-close state machine shared by all streaming shapes,
//!   plus the narrowed typed views handed to callers and handlers.
//! * **[`client::Client`]:** The typed caller used by generated client stubs.
//!
//! ## Transport boundary
//!
//! The core never opens sockets. Transports implement [`transport::Outbound`] on the calling
//! side, feed inbound calls to a [`dispatch::Dispatcher`] on the serving side, and provide a
//! [`stream::MessageChannel`] for streaming calls. [`transport::memory`] ships an in-process
//! implementation.
//!
//! ## Re-exports
//!
//! This crate re-exports `bytes`, `prost` and `prost-reflect` so generated code and consumers
//! use compatible versions of these underlying dependencies.
pub mod client;
pub mod codec;
pub mod context;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod registry;
pub mod shape;
pub mod stream;
pub mod transport;

pub use codec::{Encoding, Message, Oneway};
pub use context::{CallContext, CancelReason, InboundCall};
pub use envelope::{Ack, Headers, Request, Response};
pub use error::{ApplicationError, CallError, ErrorKind};
pub use shape::{CallingShape, MethodDescriptor, classify};

// Re-exports
pub use bytes;
pub use prost;
pub use prost_reflect;

/// Type alias for the standard boxed error used in generic bounds.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Boxed, `Send` future returned by the object-safe handler and transport traits.
pub type BoxFuture<'a, T> = futures_util::future::BoxFuture<'a, T>;
