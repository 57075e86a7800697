use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Item, KeyValueStore, StoreError, StoreResult};

/// In-process store, used by tests and as a scratch backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, BTreeMap<String, serde_json::Value>>> {
        self.items
            .lock()
            .map_err(|_| StoreError::Permanent("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Item>> {
        let items = self.lock()?;
        Ok(items.get(key).map(|value| Item::new(key, value.clone())))
    }

    async fn multi_get(&self, keys: &[String]) -> StoreResult<HashMap<String, Item>> {
        let items = self.lock()?;
        Ok(keys
            .iter()
            .filter_map(|key| {
                items
                    .get(key)
                    .map(|value| (key.clone(), Item::new(key.clone(), value.clone())))
            })
            .collect())
    }

    async fn put(&self, item: Item) -> StoreResult<()> {
        self.lock()?.insert(item.key, item.value);
        Ok(())
    }

    async fn multi_put(&self, items: Vec<Item>) -> StoreResult<()> {
        let mut store = self.lock()?;
        for item in items {
            store.insert(item.key, item.value);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn multi_delete(&self, keys: &[String]) -> StoreResult<()> {
        let mut store = self.lock()?;
        for key in keys {
            store.remove(key);
        }
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> StoreResult<Vec<Item>> {
        let items = self.lock()?;
        Ok(items
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| Item::new(key.clone(), value.clone()))
            .collect())
    }
}
