//! The opaque KV collaborator (§1: "treated as an opaque `Get(key)→bytes?`,
//! `Put(key, bytes, ttl?)`, `List(prefix, cursor)→(keys, cursor?)`
//! interface").
//!
//! Production deployments provide their own [`KvStore`]; [`InMemoryKv`] is a
//! reference implementation used by tests and local runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use proxy_core::ApiError;

/// The external key-value store this system treats as a black box.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ApiError>;

    /// `ttl_secs = None` (or `Some(0)`) means "store indefinitely".
    async fn put(&self, key: &str, value: Vec<u8>, ttl_secs: Option<u64>) -> Result<(), ApiError>;

    async fn list(
        &self,
        prefix: &str,
        cursor: Option<String>,
    ) -> Result<(Vec<String>, Option<String>), ApiError>;
}

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

/// An in-process `KvStore` used by tests and for local development; not
/// durable across restarts.
#[derive(Default)]
pub struct InMemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ApiError> {
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };
        if let Some(expires_at) = entry.expires_at {
            if Instant::now() >= expires_at {
                entries.remove(key);
                return Ok(None);
            }
        }
        Ok(Some(entry.value.clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl_secs: Option<u64>) -> Result<(), ApiError> {
        let expires_at = match ttl_secs {
            Some(secs) if secs > 0 => Some(Instant::now() + Duration::from_secs(secs)),
            _ => None,
        };
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn list(
        &self,
        prefix: &str,
        _cursor: Option<String>,
    ) -> Result<(Vec<String>, Option<String>), ApiError> {
        let entries = self.entries.lock().unwrap();
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok((keys, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let kv = InMemoryKv::new();
        kv.put("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let kv = InMemoryKv::new();
        kv.put("a_1", b"1".to_vec(), None).await.unwrap();
        kv.put("a_2", b"2".to_vec(), None).await.unwrap();
        kv.put("b_1", b"3".to_vec(), None).await.unwrap();
        let (keys, cursor) = kv.list("a_", None).await.unwrap();
        assert_eq!(keys, vec!["a_1".to_string(), "a_2".to_string()]);
        assert!(cursor.is_none());
    }
}
