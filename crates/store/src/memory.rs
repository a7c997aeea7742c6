use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::Duration;

use crate::{KvStore, StoreError, expiry_from, is_expired};

/// In-process store. State is lost when the value is dropped.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    keys: HashMap<String, (String, Option<i64>)>,
    hashes: HashMap<String, BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner
            .keys
            .get(key)
            .filter(|(_, expires_at)| !is_expired(*expires_at))
            .map(|(value, _)| value.clone()))
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        inner
            .keys
            .insert(key.to_string(), (value.to_string(), expiry_from(ttl)));
        Ok(())
    }

    fn hget(&self, namespace: &str, field: &str) -> Result<Option<String>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner
            .hashes
            .get(namespace)
            .and_then(|hash| hash.get(field))
            .cloned())
    }

    fn hset(&self, namespace: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        inner
            .hashes
            .entry(namespace.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn hgetall(&self, namespace: &str) -> Result<BTreeMap<String, String>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.hashes.get(namespace).cloned().unwrap_or_default())
    }
}
