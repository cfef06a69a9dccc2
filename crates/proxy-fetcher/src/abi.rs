//! The contract ABI store (§4.7, §4.9 step 5): a specialization of
//! [`CacheStore`] for immutable ABI metadata — written once per contract,
//! never expires (§6: `contract_abi_{addr}_{name}` → ABI JSON, no TTL).

use std::sync::Arc;

use async_trait::async_trait;
use proxy_cache::{CacheStore, CacheStoreConfig, KvStore};
use proxy_core::ApiError;
use serde::{Deserialize, Serialize};

/// A callable function's access level, per the glossary's ABI definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionAccess {
    Public,
    ReadOnly,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionAbi {
    pub name: String,
    pub access: FunctionAccess,
    /// Argument names only; deep type validation is explicitly out of
    /// scope (§4.9 step 7).
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractAbi {
    pub functions: Vec<FunctionAbi>,
}

impl ContractAbi {
    pub fn find_function(&self, name: &str) -> Option<&FunctionAbi> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// The out-of-scope collaborator that actually reads ABI metadata off
/// chain; production wires this to the same executor used for read-only
/// calls. Kept as a trait so the store is testable without a live chain.
#[async_trait]
pub trait AbiSource: Send + Sync {
    async fn fetch_abi(&self, address: &str, contract_name: &str) -> Result<ContractAbi, ApiError>;
}

/// Caches ABI lookups forever (no TTL) behind a [`CacheStore`], falling
/// back to `source` on a miss.
pub struct ContractAbiStore {
    cache: CacheStore,
    source: Arc<dyn AbiSource>,
}

impl ContractAbiStore {
    pub fn new(kv: Arc<dyn KvStore>, source: Arc<dyn AbiSource>) -> Self {
        let mut config = CacheStoreConfig::new(0);
        config.ignore_ttl = true;
        Self {
            cache: CacheStore::new(kv, config),
            source,
        }
    }

    pub async fn get(&self, address: &str, contract_name: &str) -> Result<ContractAbi, ApiError> {
        let key = format!("contract_abi_{address}_{contract_name}");
        if let Some(abi) = self.cache.get::<ContractAbi>(&key).await? {
            return Ok(abi);
        }
        let abi = self.source.fetch_abi(address, contract_name).await?;
        self.cache.set(&key, &abi, None).await?;
        Ok(abi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxy_cache::InMemoryKv;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSource {
        calls: AtomicU32,
    }

    #[async_trait]
    impl AbiSource for CountingSource {
        async fn fetch_abi(&self, _address: &str, _contract_name: &str) -> Result<ContractAbi, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ContractAbi {
                functions: vec![FunctionAbi {
                    name: "get-price".to_string(),
                    access: FunctionAccess::ReadOnly,
                    args: vec![],
                }],
            })
        }
    }

    #[tokio::test]
    async fn caches_abi_after_first_fetch() {
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
        });
        let store = ContractAbiStore::new(Arc::new(InMemoryKv::new()), source.clone());

        let first = store.get("SP1", "pool").await.unwrap();
        assert!(first.find_function("get-price").is_some());
        let second = store.get("SP1", "pool").await.unwrap();
        assert!(second.find_function("get-price").is_some());

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
