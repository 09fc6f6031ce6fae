//! # Encodings
//!
//! Every procedure is reachable under each [`Encoding`]: the Protobuf binary wire format
//! (`proto`) and its JSON rendering (`json`). The encoders themselves live in `prost` and
//! `serde_json`; this module only decides which one runs.
//!
//! ## Type-erased messages
//!
//! Handler tables are keyed by name, not by type, so the inbound path decodes requests through
//! a per-method [`MessageFactory`] into a `Box<dyn AnyMessage>`. The typed handler glue then
//! recovers the concrete type with [`downcast`]. A failure there is a [`CastError`]: a
//! registry/handler mismatch, never a data error.
use bytes::Bytes;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    any::{Any, type_name},
    fmt,
    str::FromStr,
};

/// A message that can travel under every supported encoding.
///
/// JSON bodies may omit fields, so message structs carry `#[serde(default)]` and an omitted
/// field decodes to its Protobuf default.
pub trait Message: prost::Message + fmt::Debug + Default + Serialize + DeserializeOwned + 'static {}

impl<T> Message for T where T: prost::Message + fmt::Debug + Default + Serialize + DeserializeOwned + 'static {}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Unsupported encoding '{0}'")]
    UnsupportedEncoding(String),
    #[error("Failed to decode Protobuf bytes: '{0}'")]
    ProtoDecode(#[from] prost::DecodeError),
    #[error("Failed to map message to or from JSON: '{0}'")]
    Json(#[from] serde_json::Error),
}

/// Raised when a decoded message is not of the type the handler expects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Expected a message of type '{expected}' but got '{actual}'")]
pub struct CastError {
    pub expected: &'static str,
    pub actual: &'static str,
}

/// A wire encoding supported by every registered procedure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Encoding {
    #[default]
    Proto,
    Json,
}

impl Encoding {
    /// Every encoding a procedure is registered under.
    pub const ALL: [Encoding; 2] = [Encoding::Proto, Encoding::Json];

    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Proto => "proto",
            Encoding::Json => "json",
        }
    }

    pub fn encode<T: Message>(&self, value: &T) -> Result<Bytes, CodecError> {
        match self {
            Encoding::Proto => Ok(Bytes::from(value.encode_to_vec())),
            Encoding::Json => Ok(Bytes::from(serde_json::to_vec(value)?)),
        }
    }

    /// Decodes a message. An empty JSON body decodes to the default message, matching the
    /// Protobuf behaviour for an empty buffer.
    pub fn decode<T: Message>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            Encoding::Proto => Ok(T::decode(bytes)?),
            Encoding::Json if bytes.is_empty() => Ok(T::default()),
            Encoding::Json => Ok(serde_json::from_slice(bytes)?),
        }
    }
}

impl FromStr for Encoding {
    type Err = CodecError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Encoding::ALL
            .into_iter()
            .find(|e| e.name() == name)
            .ok_or_else(|| CodecError::UnsupportedEncoding(name.to_string()))
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An object-safe view over any [`Message`].
pub trait AnyMessage: Any + Send + Sync + fmt::Debug {
    /// Rust type name of the concrete message.
    fn type_name(&self) -> &'static str;

    fn encode_as(&self, encoding: Encoding) -> Result<Bytes, CodecError>;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Message> AnyMessage for T {
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn encode_as(&self, encoding: Encoding) -> Result<Bytes, CodecError> {
        encoding.encode(self)
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Recovers the concrete message type from a type-erased message.
pub fn downcast<T: Message>(message: Box<dyn AnyMessage>) -> Result<T, CastError> {
    let actual = message.type_name();
    message
        .into_any()
        .downcast::<T>()
        .map(|message| *message)
        .map_err(|_| CastError {
            expected: type_name::<T>(),
            actual,
        })
}

/// Decodes the request message of one method into a type-erased message.
#[derive(Clone, Copy)]
pub struct MessageFactory {
    type_name: &'static str,
    decode: fn(Encoding, &[u8]) -> Result<Box<dyn AnyMessage>, CodecError>,
}

impl MessageFactory {
    pub fn of<T: Message>() -> Self {
        Self {
            type_name: type_name::<T>(),
            decode: decode_boxed::<T>,
        }
    }

    /// Rust type name of the messages this factory produces.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn decode(&self, encoding: Encoding, bytes: &[u8]) -> Result<Box<dyn AnyMessage>, CodecError> {
        (self.decode)(encoding, bytes)
    }
}

impl fmt::Debug for MessageFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageFactory").field(&self.type_name).finish()
    }
}

fn decode_boxed<T: Message>(encoding: Encoding, bytes: &[u8]) -> Result<Box<dyn AnyMessage>, CodecError> {
    Ok(Box::new(encoding.decode::<T>(bytes)?))
}

/// The "no response" sentinel message of oneway methods (`ferrule.Oneway`).
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Oneway {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(default)]
    struct Parent {
        #[prost(string, tag = "1")]
        name: String,
    }

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(default)]
    struct Entry {
        #[prost(string, tag = "1")]
        key: String,
        #[prost(bytes = "vec", tag = "2")]
        value: Vec<u8>,
        #[prost(int64, repeated, tag = "3")]
        versions: Vec<i64>,
        #[prost(message, optional, tag = "4")]
        parent: Option<Parent>,
        #[prost(bool, tag = "5")]
        deleted: bool,
    }

    fn entry() -> Entry {
        Entry {
            key: "foo".to_string(),
            value: b"bar".to_vec(),
            versions: vec![1, 2, -3],
            parent: Some(Parent {
                name: "root".to_string(),
            }),
            deleted: true,
        }
    }

    #[test]
    fn test_round_trip_under_every_encoding() {
        for encoding in Encoding::ALL {
            let bytes = encoding.encode(&entry()).unwrap();
            let decoded: Entry = encoding.decode(&bytes).unwrap();
            assert_eq!(decoded, entry(), "round trip failed under {encoding}");
        }
    }

    #[test]
    fn test_empty_body_decodes_to_default() {
        for encoding in Encoding::ALL {
            let decoded: Entry = encoding.decode(&[]).unwrap();
            assert_eq!(decoded, Entry::default());
        }
    }

    #[test]
    fn test_omitted_json_fields_decode_to_defaults() {
        let decoded: Entry = Encoding::Json.decode(br#"{"key":"foo","parent":{}}"#).unwrap();

        assert_eq!(
            decoded,
            Entry {
                key: "foo".to_string(),
                parent: Some(Parent::default()),
                ..Entry::default()
            }
        );
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!("proto".parse::<Encoding>().unwrap(), Encoding::Proto);
        assert_eq!("json".parse::<Encoding>().unwrap(), Encoding::Json);
        assert!(matches!(
            "JSON".parse::<Encoding>(),
            Err(CodecError::UnsupportedEncoding(name)) if name == "JSON"
        ));
    }

    #[test]
    fn test_invalid_json_is_a_codec_error() {
        let result = Encoding::Json.decode::<Entry>(b"{\"key\": 12");
        assert!(matches!(result, Err(CodecError::Json(_))));
    }

    #[test]
    fn test_factory_decodes_and_downcasts() {
        let factory = MessageFactory::of::<Entry>();
        let bytes = Encoding::Json.encode(&entry()).unwrap();

        let message = factory.decode(Encoding::Json, &bytes).unwrap();
        assert_eq!(message.type_name(), factory.type_name());
        assert_eq!(downcast::<Entry>(message).unwrap(), entry());
    }

    #[test]
    fn test_downcast_to_the_wrong_type_names_both_types() {
        let message: Box<dyn AnyMessage> = Box::new(entry());

        let err = downcast::<Parent>(message).unwrap_err();

        assert_eq!(err.expected, type_name::<Parent>());
        assert_eq!(err.actual, type_name::<Entry>());
    }
}
