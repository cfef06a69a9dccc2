//! The `knownAddresses`/`knownContracts` indices (§4.8 "side effects
//! captured on dispatch", §6 persisted-state layout, Glossary I5).
//!
//! Both are small JSON arrays stored whole under a single well-known key;
//! insertion is idempotent. Each index is written by exactly one actor
//! (`hiro-api` for addresses, `contract-calls` for contracts), so no
//! cross-writer coordination is needed beyond the KV's own last-writer-wins
//! semantics per key.

use std::sync::Arc;

use proxy_cache::KvStore;
use proxy_core::ApiError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

pub const KNOWN_ADDRESSES_KEY: &str = "aibtcdev_known_stacks_addresses";
pub const KNOWN_CONTRACTS_KEY: &str = "known_contracts";

/// A durable, idempotent JSON-array set backed directly by the KV (no TTL,
/// no bigint concerns — just a small set of strings or small objects).
pub struct JsonSetIndex {
    kv: Arc<dyn KvStore>,
    key: &'static str,
}

impl JsonSetIndex {
    pub fn new(kv: Arc<dyn KvStore>, key: &'static str) -> Self {
        Self { kv, key }
    }

    pub async fn list<T: DeserializeOwned>(&self) -> Result<Vec<T>, ApiError> {
        let Some(bytes) = self.kv.get(self.key).await? else {
            return Ok(Vec::new());
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::cache(format!("corrupt index at {}: {e}", self.key)))
    }

    /// Inserts `item` if not already present (by JSON equality). Returns
    /// `true` if it was newly added.
    pub async fn insert<T: Serialize + PartialEq + DeserializeOwned>(
        &self,
        item: T,
    ) -> Result<bool, ApiError> {
        let mut items: Vec<T> = self.list().await?;
        if items.contains(&item) {
            return Ok(false);
        }
        items.push(item);
        let bytes = serde_json::to_vec(&items)
            .map_err(|e| ApiError::cache(format!("failed to encode index {}: {e}", self.key)))?;
        self.kv.put(self.key, bytes, None).await?;
        Ok(true)
    }

    pub async fn list_raw(&self) -> Result<Vec<Value>, ApiError> {
        self.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxy_cache::InMemoryKv;

    #[tokio::test]
    async fn insert_is_idempotent() {
        let index = JsonSetIndex::new(Arc::new(InMemoryKv::new()), KNOWN_ADDRESSES_KEY);
        assert!(index.insert("SP1".to_string()).await.unwrap());
        assert!(!index.insert("SP1".to_string()).await.unwrap());
        let list: Vec<String> = index.list().await.unwrap();
        assert_eq!(list, vec!["SP1".to_string()]);
    }

    #[tokio::test]
    async fn list_on_empty_key_is_empty() {
        let index = JsonSetIndex::new(Arc::new(InMemoryKv::new()), KNOWN_CONTRACTS_KEY);
        let list: Vec<Value> = index.list().await.unwrap();
        assert!(list.is_empty());
    }
}
