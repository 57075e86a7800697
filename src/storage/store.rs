use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A record in a key/value store. The value is an opaque JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub key: String,
    pub value: serde_json::Value,
}

impl Item {
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Expected to succeed if the same request is sent again
    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Store failure: {0}")]
    Permanent(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Contract for the key/value service backing wallets and transactions.
///
/// Multi-item writes are all-or-nothing: either every item in the request is
/// applied or none is.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Item>>;

    /// Keys that do not exist are absent from the returned map.
    async fn multi_get(&self, keys: &[String]) -> StoreResult<HashMap<String, Item>>;

    async fn put(&self, item: Item) -> StoreResult<()>;

    async fn multi_put(&self, items: Vec<Item>) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    async fn multi_delete(&self, keys: &[String]) -> StoreResult<()>;

    /// All items whose key starts with `prefix`, ordered by key.
    async fn scan(&self, prefix: &str) -> StoreResult<Vec<Item>>;
}
