//! # Envelopes
//!
//! Transport-neutral request and response containers. A [`Request`] is created by the caller
//! for every call attempt; the callee consumes it and produces a [`Response`]. Bodies are
//! opaque bytes: encoding and decoding happen in the handler adapters and typed callers,
//! never in the transport.
use bytes::Bytes;

/// Header carrying the name of an application error.
pub const APPLICATION_ERROR_NAME_HEADER: &str = "rpc-application-error-name";
/// Header carrying the message of an application error.
pub const APPLICATION_ERROR_MESSAGE_HEADER: &str = "rpc-application-error-message";

/// An ordered, case-sensitive mapping of header names to values.
///
/// Insertion order is preserved. Inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under exactly `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Inserts a header, returning the previous value if the key was present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, current)) => Some(std::mem::replace(current, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

impl From<Vec<(String, String)>> for Headers {
    fn from(value: Vec<(String, String)>) -> Self {
        value.into_iter().collect()
    }
}

impl IntoIterator for Headers {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// An outbound or inbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Name of the calling service.
    pub caller: String,
    /// Fully qualified name of the service being called (e.g. `kv.KeyValue`).
    pub service: String,
    /// Name of the method being called (e.g. `GetValue`).
    pub method: String,
    /// Name of the encoding used for the body (e.g. `proto`, `json`).
    pub encoding: String,
    pub headers: Headers,
    /// The encoded request message. Empty for stream openings.
    pub body: Bytes,
}

/// The result of a unary call that reached its handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub headers: Headers,
    /// The encoded response message, or the encoded error details of an application error.
    pub body: Bytes,
    /// Set when the handler failed with an application error.
    pub application_error: bool,
}

impl Response {
    /// A successful response wrapping an encoded message.
    pub fn new(body: Bytes) -> Self {
        Self {
            body,
            ..Default::default()
        }
    }
}

/// Acknowledgement returned for a oneway call once the transport accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_preserve_insertion_order() {
        let headers: Headers = [("b", "1"), ("a", "2"), ("c", "3")].into_iter().collect();

        let keys: Vec<_> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_headers_replace_in_place() {
        let mut headers: Headers = [("x", "1"), ("y", "2")].into_iter().collect();

        assert_eq!(headers.insert("x", "3"), Some("1".to_string()));

        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, vec![("x", "3"), ("y", "2")]);
    }

    #[test]
    fn test_headers_are_case_sensitive() {
        let mut headers = Headers::new();
        headers.insert("Key", "upper");
        headers.insert("key", "lower");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("Key"), Some("upper"));
        assert_eq!(headers.get("key"), Some("lower"));
        assert_eq!(headers.get("KEY"), None);

        assert_eq!(headers.remove("Key"), Some("upper".to_string()));
        assert_eq!(headers.get("Key"), None);
    }
}
