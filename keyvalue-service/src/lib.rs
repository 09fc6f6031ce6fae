//! # KeyValue Service
//!
//! An in-memory key-value store served through bindings generated by `ferrule-gen` at build
//! time. It exercises every calling shape:
//!
//! | Method     | Shape            |
//! |------------|------------------|
//! | `GetValue` | unary            |
//! | `SetValue` | unary            |
//! | `Forget`   | oneway           |
//! | `SetMany`  | client streaming |
//! | `Watch`    | server streaming |
//! | `Sync`     | bidi streaming   |
use ferrule_core::{ApplicationError, CallContext, CallError};
use kv::{
    Entry, GetValueRequest, GetValueResponse, KeyNotFound, KeyValueServer, KeyValueSetManyStream,
    KeyValueSyncStream, KeyValueWatchStream, SetManyResponse, SetValueRequest, SetValueResponse,
    WatchRequest,
};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::RwLock;

pub mod kv {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(default)]
    pub struct GetValueRequest {
        #[prost(string, tag = "1")]
        pub key: String,
    }

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(default)]
    pub struct GetValueResponse {
        #[prost(string, tag = "1")]
        pub value: String,
    }

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(default)]
    pub struct SetValueRequest {
        #[prost(string, tag = "1")]
        pub key: String,
        #[prost(string, tag = "2")]
        pub value: String,
    }

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(default)]
    pub struct SetValueResponse {}

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(default)]
    pub struct SetManyResponse {
        #[prost(uint32, tag = "1")]
        pub count: u32,
        #[prost(string, repeated, tag = "2")]
        pub keys: Vec<String>,
    }

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(default)]
    pub struct WatchRequest {
        #[prost(string, repeated, tag = "1")]
        pub keys: Vec<String>,
    }

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(default)]
    pub struct Entry {
        #[prost(string, tag = "1")]
        pub key: String,
        #[prost(string, tag = "2")]
        pub value: String,
    }

    /// Details of the `NotFound` application error.
    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(default)]
    pub struct KeyNotFound {
        #[prost(string, tag = "1")]
        pub key: String,
    }

    include!(concat!(env!("OUT_DIR"), "/kv.ferrule.rs"));
}

/// Name of the application error returned for a missing key.
pub const NOT_FOUND: &str = "NotFound";
/// Name of the application error returned for a watch without keys.
pub const EMPTY_WATCH: &str = "EmptyWatch";

#[derive(Debug, Clone, Default)]
pub struct KeyValueService {
    store: Arc<RwLock<BTreeMap<String, String>>>,
}

impl KeyValueService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<K: Into<String>, V: Into<String>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        let store = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.store.read().await.get(key).cloned()
    }
}

impl KeyValueServer for KeyValueService {
    async fn get_value(&self, ctx: CallContext, request: GetValueRequest) -> Result<GetValueResponse, CallError> {
        if let Some(call) = ctx.call() {
            tracing::debug!(caller = %call.caller, key = %request.key, "GetValue");
        }
        match self.get(&request.key).await {
            Some(value) => Ok(GetValueResponse { value }),
            None => Err(ApplicationError::new(NOT_FOUND, format!("No value for key '{}'", request.key))
                .with_details(KeyNotFound { key: request.key })
                .into()),
        }
    }

    async fn set_value(&self, _ctx: CallContext, request: SetValueRequest) -> Result<SetValueResponse, CallError> {
        self.store.write().await.insert(request.key, request.value);
        Ok(SetValueResponse {})
    }

    async fn forget(&self, _ctx: CallContext, request: GetValueRequest) -> Result<(), CallError> {
        self.store.write().await.remove(&request.key);
        Ok(())
    }

    async fn set_many(&self, mut requests: KeyValueSetManyStream<'_>) -> Result<SetManyResponse, CallError> {
        let mut keys = Vec::new();
        while let Some(request) = requests.recv().await? {
            self.store.write().await.insert(request.key.clone(), request.value);
            keys.push(request.key);
        }
        Ok(SetManyResponse {
            count: keys.len() as u32,
            keys,
        })
    }

    async fn watch(&self, request: WatchRequest, mut responses: KeyValueWatchStream<'_>) -> Result<(), CallError> {
        if request.keys.is_empty() {
            return Err(ApplicationError::new(EMPTY_WATCH, "At least one key must be watched").into());
        }

        let entries: Vec<Entry> = {
            let store = self.store.read().await;
            request
                .keys
                .into_iter()
                .filter_map(|key| store.get(&key).cloned().map(|value| Entry { key, value }))
                .collect()
        };

        for entry in &entries {
            responses.send(entry).await?;
        }
        Ok(())
    }

    /// Stores every received entry and answers with the value it replaced.
    async fn sync(&self, mut stream: KeyValueSyncStream<'_>) -> Result<(), CallError> {
        while let Some(entry) = stream.recv().await? {
            let previous = self.store.write().await.insert(entry.key.clone(), entry.value);
            stream
                .send(&Entry {
                    key: entry.key,
                    value: previous.unwrap_or_default(),
                })
                .await?;
        }
        Ok(())
    }
}
