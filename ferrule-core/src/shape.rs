//! # Calling Shapes
//!
//! Every method of an interface definition is served and called in exactly one of five shapes.
//! The shape is never stored: it is recomputed from the [`MethodDescriptor`] by [`classify`]
//! whenever it is needed, so the generator and the registry wiring cannot drift apart.
use std::fmt;

/// Fully qualified name of the message type marking a method as fire-and-forget.
pub const ONEWAY_TYPE: &str = "ferrule.Oneway";

/// The parsed signature of one method of a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Fully qualified service name (e.g. `kv.KeyValue`).
    pub service_name: String,
    /// Method name as written in the interface definition (e.g. `GetValue`).
    pub method_name: String,
    /// Fully qualified request message name, without a leading period.
    pub request_type: String,
    /// Fully qualified response message name, without a leading period.
    pub response_type: String,
    pub client_streaming: bool,
    pub server_streaming: bool,
}

impl MethodDescriptor {
    /// Returns true when the response type is the given "no response" sentinel.
    pub fn returns(&self, type_name: &str) -> bool {
        self.response_type == type_name.trim_start_matches('.')
    }
}

impl From<&prost_reflect::MethodDescriptor> for MethodDescriptor {
    fn from(method: &prost_reflect::MethodDescriptor) -> Self {
        Self {
            service_name: method.parent_service().full_name().to_string(),
            method_name: method.name().to_string(),
            request_type: method.input().full_name().to_string(),
            response_type: method.output().full_name().to_string(),
            client_streaming: method.is_client_streaming(),
            server_streaming: method.is_server_streaming(),
        }
    }
}

/// How a method exchanges messages between caller and handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallingShape {
    /// One request, one response.
    Unary,
    /// One request, no response beyond the transport's acknowledgement.
    Oneway,
    /// Many requests, one response once the caller half-closes.
    ClientStreaming,
    /// One request, many responses.
    ServerStreaming,
    /// Many requests and many responses, interleaved.
    BidiStreaming,
}

impl CallingShape {
    /// All shapes, in the order generated code groups them.
    pub const ALL: [CallingShape; 5] = [
        CallingShape::Unary,
        CallingShape::Oneway,
        CallingShape::ClientStreaming,
        CallingShape::ServerStreaming,
        CallingShape::BidiStreaming,
    ];

    /// Returns true for the three shapes served through a stream session.
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            CallingShape::ClientStreaming
                | CallingShape::ServerStreaming
                | CallingShape::BidiStreaming
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            CallingShape::Unary => "unary",
            CallingShape::Oneway => "oneway",
            CallingShape::ClientStreaming => "client-streaming",
            CallingShape::ServerStreaming => "server-streaming",
            CallingShape::BidiStreaming => "bidi-streaming",
        }
    }
}

impl fmt::Display for CallingShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classifies a method using [`ONEWAY_TYPE`] as the oneway sentinel.
pub fn classify(method: &MethodDescriptor) -> CallingShape {
    classify_with(method, ONEWAY_TYPE)
}

/// Classifies a method against a custom oneway sentinel type.
///
/// Rules are applied in a fixed priority so every descriptor maps to exactly one shape:
/// oneway, unary, client streaming, server streaming, bidirectional streaming.
pub fn classify_with(method: &MethodDescriptor, oneway_type: &str) -> CallingShape {
    match (method.client_streaming, method.server_streaming) {
        (false, false) if method.returns(oneway_type) => CallingShape::Oneway,
        (false, false) => CallingShape::Unary,
        (true, false) => CallingShape::ClientStreaming,
        (false, true) => CallingShape::ServerStreaming,
        (true, true) => CallingShape::BidiStreaming,
    }
}
