use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};

use crate::{KvStore, StoreError, expiry_from, is_expired};

/// Separates a hash namespace from its field inside the `hashes` partition.
const FIELD_SEPARATOR: u8 = 0;

/// Plain key as stored in the `keys` partition.
#[derive(Serialize, Deserialize)]
struct StoredValue {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
}

/// On-disk store backed by a fjall keyspace.
///
/// Plain keys live in the `keys` partition. Every hash namespace shares the
/// `hashes` partition under a `namespace\0field` key, so `hgetall` is a
/// prefix scan.
pub struct FjallStore {
    keyspace: Keyspace,
    keys: PartitionHandle,
    hashes: PartitionHandle,
}

impl FjallStore {
    /// Opens (or creates) a store in `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let keyspace = fjall::Config::new(path).open()?;
        let keys = keyspace.open_partition("keys", PartitionCreateOptions::default())?;
        let hashes = keyspace.open_partition("hashes", PartitionCreateOptions::default())?;
        tracing::debug!(path = %path.display(), "opened status store");
        Ok(Self {
            keyspace,
            keys,
            hashes,
        })
    }

    /// Flushes the journal so every write so far survives a crash.
    pub fn persist(&self) -> Result<(), StoreError> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    fn hash_prefix(namespace: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(namespace.len() + 1);
        prefix.extend_from_slice(namespace.as_bytes());
        prefix.push(FIELD_SEPARATOR);
        prefix
    }

    fn hash_key(namespace: &str, field: &str) -> Vec<u8> {
        let mut key = Self::hash_prefix(namespace);
        key.extend_from_slice(field.as_bytes());
        key
    }
}

fn utf8(bytes: &[u8], what: &str) -> Result<String, StoreError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| StoreError::Utf8(what.to_string()))
}

impl KvStore for FjallStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let Some(raw) = self.keys.get(key)? else {
            return Ok(None);
        };
        let stored: StoredValue = serde_json::from_slice(&raw)?;
        if is_expired(stored.expires_at) {
            self.keys.remove(key)?;
            return Ok(None);
        }
        Ok(Some(stored.value))
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let stored = StoredValue {
            value: value.to_string(),
            expires_at: expiry_from(ttl),
        };
        self.keys.insert(key, serde_json::to_vec(&stored)?)?;
        Ok(())
    }

    fn hget(&self, namespace: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.hashes
            .get(Self::hash_key(namespace, field))?
            .map(|raw| utf8(&raw, "hash value"))
            .transpose()
    }

    fn hset(&self, namespace: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.hashes
            .insert(Self::hash_key(namespace, field), value.as_bytes())?;
        Ok(())
    }

    fn hgetall(&self, namespace: &str) -> Result<BTreeMap<String, String>, StoreError> {
        let prefix = Self::hash_prefix(namespace);
        let mut fields = BTreeMap::new();
        for item in self.hashes.prefix(&prefix) {
            let (key, value) = item?;
            let field = utf8(&key[prefix.len()..], "hash field")?;
            fields.insert(field, utf8(&value, "hash value")?);
        }
        Ok(fields)
    }
}
