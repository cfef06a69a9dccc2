//! The `/stacks-account/{addr}` actor (§6 route table; §9's per-address
//! sharding note). One shared instance serves every address: durable state
//! is namespaced per address (`account_{addr}_nonce`) so each address's
//! key is still single-writer even though the Rust object is not
//! literally per-address.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use proxy_cache::KvStore;
use proxy_core::ApiError;
use proxy_fetcher::{is_valid_stacks_address, FetchOptions, RateLimitedFetcher};
use serde_json::{json, Value};

use super::{bust_cache_query, descriptor, endpoint_not_found, RouteActor};

const BASE_PATH: &str = "/stacks-account";
const SUPPORTED_ENDPOINTS: &[&str] = &["/{addr}/nonce", "/{addr}/nonce/sync", "/{addr}/nonce/update"];

pub struct StacksAccountActor {
    fetcher: RateLimitedFetcher,
    kv: Arc<dyn KvStore>,
}

impl StacksAccountActor {
    pub fn new(fetcher: RateLimitedFetcher, kv: Arc<dyn KvStore>) -> Self {
        Self { fetcher, kv }
    }

    fn nonce_key(addr: &str) -> String {
        format!("account_{addr}_nonce")
    }

    async fn fetch_upstream_nonce(&self, addr: &str, bust_cache: bool) -> Result<i64, ApiError> {
        let endpoint = format!("/extended/v1/address/{addr}/nonces");
        let cache_key = format!("stacks-account_{addr}_nonces");
        let resp = self
            .fetcher
            .fetch(
                &endpoint,
                &cache_key,
                FetchOptions {
                    bust_cache,
                    ..Default::default()
                },
            )
            .await?;
        let parsed: Value = serde_json::from_str(&resp.body)
            .map_err(|e| ApiError::upstream(format!("malformed nonce response: {e}")))?;
        parsed
            .get("possible_next_nonce")
            .and_then(Value::as_i64)
            .ok_or_else(|| ApiError::upstream("nonce response missing possible_next_nonce"))
    }

    async fn stored_nonce(&self, addr: &str) -> Result<Option<i64>, ApiError> {
        let Some(bytes) = self.kv.get(&Self::nonce_key(addr)).await? else {
            return Ok(None);
        };
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::cache(format!("corrupt stored nonce for {addr}: {e}")))?;
        Ok(value.as_i64())
    }

    async fn store_nonce(&self, addr: &str, nonce: i64) -> Result<(), ApiError> {
        let bytes = serde_json::to_vec(&json!(nonce)).expect("i64 always serializes");
        self.kv.put(&Self::nonce_key(addr), bytes, None).await
    }

    async fn get_nonce(&self, addr: &str, bust_cache: bool) -> Result<Value, ApiError> {
        if !bust_cache {
            if let Some(nonce) = self.stored_nonce(addr).await? {
                return Ok(json!({"nonce": nonce}));
            }
        }
        let nonce = self.fetch_upstream_nonce(addr, bust_cache).await?;
        self.store_nonce(addr, nonce).await?;
        Ok(json!({"nonce": nonce}))
    }

    async fn sync_nonce(&self, addr: &str) -> Result<Value, ApiError> {
        let nonce = self.fetch_upstream_nonce(addr, true).await?;
        self.store_nonce(addr, nonce).await?;
        Ok(json!({"nonce": nonce}))
    }

    async fn update_nonce(&self, addr: &str, body: Value) -> Result<Value, ApiError> {
        let nonce = body
            .get("nonce")
            .and_then(Value::as_i64)
            .ok_or_else(|| ApiError::invalid_request("nonce/update requires an integer 'nonce'"))?;
        self.store_nonce(addr, nonce).await?;
        Ok(json!({"nonce": nonce}))
    }
}

/// `/{addr}/{rest}` → `Some((addr, rest))`, where `rest` is `nonce`,
/// `nonce/sync`, or `nonce/update`.
fn parse_endpoint(endpoint: &str) -> Option<(&str, &str)> {
    let rest = endpoint.strip_prefix('/')?;
    rest.split_once('/')
}

#[async_trait]
impl RouteActor for StacksAccountActor {
    fn base_path(&self) -> &'static str {
        BASE_PATH
    }

    async fn dispatch(
        &self,
        method: &Method,
        endpoint: &str,
        query: &HashMap<String, String>,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        if endpoint.is_empty() || endpoint == "/" {
            return Ok(descriptor("stacks-account", BASE_PATH, SUPPORTED_ENDPOINTS));
        }
        let Some((addr, action)) = parse_endpoint(endpoint) else {
            return Err(endpoint_not_found(endpoint, SUPPORTED_ENDPOINTS));
        };
        if !is_valid_stacks_address(addr) {
            return Err(ApiError::invalid_contract_address(addr));
        }

        match action {
            "nonce" if method == Method::GET => {
                self.get_nonce(addr, bust_cache_query(query)).await
            }
            "nonce/sync" if method == Method::POST => self.sync_nonce(addr).await,
            "nonce/update" if method == Method::POST => {
                let body = body
                    .ok_or_else(|| ApiError::invalid_request("nonce/update requires a JSON body"))?;
                self.update_nonce(addr, body).await
            }
            _ => Err(endpoint_not_found(endpoint, SUPPORTED_ENDPOINTS)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_address_and_action() {
        assert_eq!(parse_endpoint("/SP1/nonce"), Some(("SP1", "nonce")));
        assert_eq!(parse_endpoint("/SP1/nonce/sync"), Some(("SP1", "nonce/sync")));
        assert_eq!(parse_endpoint("/SP1"), None);
    }
}
