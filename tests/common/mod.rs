// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use ewallet::application::{ServiceSettings, WalletService, WithdrawalOrder, WithdrawalPublisher};
use ewallet::storage::{
    BatchPersistence, Item, KeyValueStore, MemoryStore, SqliteStore, StoreError, StoreResult,
    WalletRepository, sqlite,
};
use tempfile::TempDir;

/// Store that fails multi-item requests according to a script.
///
/// Each multi_get / multi_put / multi_delete call pops one entry: `Some(err)`
/// fails the call, `None` lets it through. An empty script always passes.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    script: Mutex<VecDeque<Option<StoreError>>>,
    calls: Mutex<Vec<usize>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<Option<StoreError>>) -> Self {
        let store = Self::new();
        *store.script.lock().unwrap() = script.into();
        store
    }

    /// Size of every multi-item request seen so far, in order.
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn next(&self, size: usize) -> StoreResult<()> {
        self.calls.lock().unwrap().push(size);
        match self.script.lock().unwrap().pop_front() {
            Some(Some(err)) => Err(err),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Item>> {
        self.inner.get(key).await
    }

    async fn multi_get(&self, keys: &[String]) -> StoreResult<HashMap<String, Item>> {
        self.next(keys.len())?;
        self.inner.multi_get(keys).await
    }

    async fn put(&self, item: Item) -> StoreResult<()> {
        self.inner.put(item).await
    }

    async fn multi_put(&self, items: Vec<Item>) -> StoreResult<()> {
        self.next(items.len())?;
        self.inner.multi_put(items).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key).await
    }

    async fn multi_delete(&self, keys: &[String]) -> StoreResult<()> {
        self.next(keys.len())?;
        self.inner.multi_delete(keys).await
    }

    async fn scan(&self, prefix: &str) -> StoreResult<Vec<Item>> {
        self.inner.scan(prefix).await
    }
}

/// Store whose every call fails permanently.
pub struct BrokenStore;

#[async_trait]
impl KeyValueStore for BrokenStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<Item>> {
        Err(StoreError::Permanent("store offline".into()))
    }

    async fn multi_get(&self, _keys: &[String]) -> StoreResult<HashMap<String, Item>> {
        Err(StoreError::Permanent("store offline".into()))
    }

    async fn put(&self, _item: Item) -> StoreResult<()> {
        Err(StoreError::Permanent("store offline".into()))
    }

    async fn multi_put(&self, _items: Vec<Item>) -> StoreResult<()> {
        Err(StoreError::Permanent("store offline".into()))
    }

    async fn delete(&self, _key: &str) -> StoreResult<()> {
        Err(StoreError::Permanent("store offline".into()))
    }

    async fn multi_delete(&self, _keys: &[String]) -> StoreResult<()> {
        Err(StoreError::Permanent("store offline".into()))
    }

    async fn scan(&self, _prefix: &str) -> StoreResult<Vec<Item>> {
        Err(StoreError::Permanent("store offline".into()))
    }
}

/// Publisher that keeps every order it receives.
#[derive(Default)]
pub struct RecordingPublisher {
    orders: Mutex<Vec<(String, WithdrawalOrder)>>,
}

impl RecordingPublisher {
    pub fn orders(&self) -> Vec<(String, WithdrawalOrder)> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl WithdrawalPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, order: &WithdrawalOrder) -> Result<()> {
        self.orders
            .lock()
            .unwrap()
            .push((topic.to_string(), order.clone()));
        Ok(())
    }
}

/// Publisher that always fails.
pub struct FailingPublisher;

#[async_trait]
impl WithdrawalPublisher for FailingPublisher {
    async fn publish(&self, _topic: &str, _order: &WithdrawalOrder) -> Result<()> {
        anyhow::bail!("topic does not exist")
    }
}

pub fn settings() -> ServiceSettings {
    ServiceSettings {
        withdrawal_topic: "withdrawals".to_string(),
        allowed_currencies: vec!["USD".to_string(), "EUR".to_string()],
    }
}

/// Helper to create a test service over a temporary SQLite database
pub async fn test_service() -> Result<(WalletService, Arc<RecordingPublisher>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let pool = sqlite::init(&format!("sqlite:{}?mode=rwc", db_path.display())).await?;

    let repo = WalletRepository::new(
        Arc::new(SqliteStore::new(pool.clone(), "wallets")),
        Arc::new(SqliteStore::new(pool, "transactions")),
        BatchPersistence::default(),
    );
    let publisher = Arc::new(RecordingPublisher::default());
    let service = WalletService::new(repo, publisher.clone(), settings());
    Ok((service, publisher, temp_dir))
}

/// Helper to create a test service over in-memory stores
pub fn memory_service(publisher: Arc<dyn WithdrawalPublisher>) -> WalletService {
    let repo = WalletRepository::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
        BatchPersistence::default(),
    );
    WalletService::new(repo, publisher, settings())
}

/// `n` keys named `key-000`, `key-001`, ...
pub fn keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("key-{:03}", i)).collect()
}

pub fn items(n: usize) -> Vec<Item> {
    keys(n)
        .into_iter()
        .enumerate()
        .map(|(i, key)| Item::new(key, serde_json::json!({ "n": i })))
        .collect()
}
