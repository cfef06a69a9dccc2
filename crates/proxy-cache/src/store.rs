//! The cache store (§4.2): a typed, TTL-aware layer over [`KvStore`].

use std::sync::Arc;

use proxy_core::ApiError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::bigint::normalize_legacy_bigint_suffixes;
use crate::kv::KvStore;

/// TTL policy for a [`CacheStore`].
#[derive(Debug, Clone, Copy)]
pub struct CacheStoreConfig {
    pub default_ttl_seconds: u64,
    /// When set, entries are written without an expiry regardless of
    /// `default_ttl_seconds` or any per-call override (B3).
    pub ignore_ttl: bool,
}

impl CacheStoreConfig {
    pub fn new(default_ttl_seconds: u64) -> Self {
        Self {
            default_ttl_seconds,
            ignore_ttl: false,
        }
    }
}

/// A typed cache over an opaque [`KvStore`], with bigint-safe JSON codec and
/// TTL handling.
#[derive(Clone)]
pub struct CacheStore {
    kv: Arc<dyn KvStore>,
    config: CacheStoreConfig,
}

impl CacheStore {
    pub fn new(kv: Arc<dyn KvStore>, config: CacheStoreConfig) -> Self {
        Self { kv, config }
    }

    /// Reads and JSON-decodes `key`. Returns `Ok(None)` on a cache miss,
    /// distinct from an upstream error (B-class distinction carried through
    /// by the `Result` itself).
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ApiError> {
        let Some(bytes) = self.kv.get(key).await? else {
            return Ok(None);
        };
        let mut value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::cache(format!("corrupt cache entry at {key}: {e}")))?;
        normalize_legacy_bigint_suffixes(&mut value);
        let decoded = serde_json::from_value(value)
            .map_err(|e| ApiError::cache(format!("cache entry at {key} has unexpected shape: {e}")))?;
        trace!(key, "cache hit");
        Ok(Some(decoded))
    }

    /// JSON-encodes `value` and writes it under `key`, applying the store's
    /// TTL policy unless `ttl_override_seconds` is given.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_override_seconds: Option<u64>,
    ) -> Result<(), ApiError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| ApiError::cache(format!("failed to encode cache entry: {e}")))?;
        let ttl = self.effective_ttl(ttl_override_seconds);
        self.kv.put(key, bytes, ttl).await?;
        trace!(key, ttl_secs = ?ttl, "cache write");
        Ok(())
    }

    /// Lists keys under `prefix`, delegating straight to the backing store.
    pub async fn list(
        &self,
        prefix: &str,
        cursor: Option<String>,
    ) -> Result<(Vec<String>, Option<String>), ApiError> {
        self.kv.list(prefix, cursor).await
    }

    fn effective_ttl(&self, override_seconds: Option<u64>) -> Option<u64> {
        if self.config.ignore_ttl {
            return None;
        }
        match override_seconds {
            Some(0) => None,
            Some(secs) => Some(secs),
            None => Some(self.config.default_ttl_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKv;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Widget {
        name: String,
        count: u32,
    }

    fn store() -> CacheStore {
        CacheStore::new(Arc::new(InMemoryKv::new()), CacheStoreConfig::new(60))
    }

    #[tokio::test]
    async fn miss_returns_none() {
        let store = store();
        let result: Option<Widget> = store.get("missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = store();
        let widget = Widget {
            name: "gizmo".into(),
            count: 3,
        };
        store.set("k", &widget, None).await.unwrap();
        let back: Option<Widget> = store.get("k").await.unwrap();
        assert_eq!(back, Some(widget));
    }

    #[tokio::test]
    async fn legacy_bigint_suffix_is_normalized_on_read() {
        let kv = Arc::new(InMemoryKv::new());
        kv.put(
            "k",
            br#"{"name":"x","count":"9007199254740993n"}"#.to_vec(),
            None,
        )
        .await
        .unwrap();
        let store = CacheStore::new(kv, CacheStoreConfig::new(60));
        #[derive(Debug, Deserialize, PartialEq)]
        struct Balance {
            name: String,
            count: String,
        }
        let back: Option<Balance> = store.get("k").await.unwrap();
        assert_eq!(
            back,
            Some(Balance {
                name: "x".into(),
                count: "9007199254740993".into(),
            })
        );
    }

    #[tokio::test]
    async fn ignore_ttl_writes_without_expiry() {
        let kv = Arc::new(InMemoryKv::new());
        let mut config = CacheStoreConfig::new(60);
        config.ignore_ttl = true;
        let store = CacheStore::new(kv.clone(), config);
        store.set("k", &Widget { name: "g".into(), count: 1 }, Some(1)).await.unwrap();
        // An in-memory TTL of Some(1) would normally expire after a second;
        // ignore_ttl must have overridden that to "no expiry".
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let back: Option<Widget> = store.get("k").await.unwrap();
        assert!(back.is_some());
    }
}
