//! The `/hiro-api` actor: cached passthrough to the Stacks chain API, plus
//! the `knownAddresses` index (§6 route table, §4.8 side effects).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use proxy_cache::{CacheKeyBuilder, KvStore};
use proxy_core::ApiError;
use proxy_fetcher::{FetchOptions, RateLimitedFetcher};
use serde_json::{json, Value};
use tracing::info;

use super::alarm::Warmable;
use super::{bust_cache_query, descriptor, endpoint_not_found, response_to_data, RouteActor};
use crate::known_index::{JsonSetIndex, KNOWN_ADDRESSES_KEY};

const BASE_PATH: &str = "/hiro-api";
const CACHE_PREFIX: &str = "hiro-api_";
const SUPPORTED_ENDPOINTS: &[&str] = &[
    "/extended",
    "/v2/info",
    "/extended/v1/address/{addr}/assets",
    "/extended/v1/address/{addr}/balances",
    "/known-addresses",
];

pub struct HiroApiActor {
    fetcher: RateLimitedFetcher,
    known_addresses: JsonSetIndex,
    kv: Arc<dyn KvStore>,
}

impl HiroApiActor {
    pub fn new(fetcher: RateLimitedFetcher, kv: Arc<dyn KvStore>) -> Self {
        Self {
            fetcher,
            known_addresses: JsonSetIndex::new(kv.clone(), KNOWN_ADDRESSES_KEY),
            kv,
        }
    }

    async fn known_addresses_stats(&self) -> Result<Value, ApiError> {
        let storage: Vec<String> = self.known_addresses.list().await?;
        let mut cached = Vec::new();
        let mut uncached = Vec::new();
        for addr in &storage {
            let key = CacheKeyBuilder::path_key(
                CACHE_PREFIX,
                &format!("/extended/v1/address/{addr}/balances"),
            );
            if self.kv.get(&key).await?.is_some() {
                cached.push(addr.clone());
            } else {
                uncached.push(addr.clone());
            }
        }
        Ok(json!({
            "stats": {
                "storage": storage.len(),
                "cached": cached.len(),
                "uncached": uncached.len(),
            },
            "addresses": {
                "storage": storage,
                "cached": cached,
                "uncached": uncached,
            }
        }))
    }

    async fn passthrough(&self, endpoint: &str, bust_cache: bool) -> Result<Value, ApiError> {
        let cache_key = CacheKeyBuilder::path_key(CACHE_PREFIX, endpoint);
        let resp = self
            .fetcher
            .fetch(
                endpoint,
                &cache_key,
                FetchOptions {
                    bust_cache,
                    ..Default::default()
                },
            )
            .await?;
        Ok(response_to_data(&resp))
    }
}

/// `/extended/v1/address/{addr}/{assets|balances}` → `Some((addr, kind))`.
fn parse_address_endpoint(endpoint: &str) -> Option<(&str, &str)> {
    let rest = endpoint.strip_prefix("/extended/v1/address/")?;
    let (addr, kind) = rest.split_once('/')?;
    if addr.is_empty() || !matches!(kind, "assets" | "balances") {
        return None;
    }
    Some((addr, kind))
}

#[async_trait]
impl RouteActor for HiroApiActor {
    fn base_path(&self) -> &'static str {
        BASE_PATH
    }

    async fn dispatch(
        &self,
        method: &Method,
        endpoint: &str,
        query: &HashMap<String, String>,
        _body: Option<Value>,
    ) -> Result<Value, ApiError> {
        if method != Method::GET {
            return Err(ApiError::invalid_request("hiro-api only supports GET"));
        }
        if endpoint.is_empty() || endpoint == "/" {
            return Ok(descriptor("hiro-api", BASE_PATH, SUPPORTED_ENDPOINTS));
        }

        let bust_cache = bust_cache_query(query);

        if endpoint == "/extended" || endpoint == "/v2/info" {
            return self.passthrough(endpoint, bust_cache).await;
        }

        if endpoint == "/known-addresses" {
            return self.known_addresses_stats().await;
        }

        if let Some((addr, _kind)) = parse_address_endpoint(endpoint) {
            self.known_addresses.insert(addr.to_string()).await?;
            return self.passthrough(endpoint, bust_cache).await;
        }

        Err(endpoint_not_found(endpoint, SUPPORTED_ENDPOINTS))
    }
}

#[async_trait]
impl Warmable for HiroApiActor {
    async fn warm_once(&self) {
        let started = std::time::Instant::now();
        let addresses = match self.known_addresses.list::<String>().await {
            Ok(addrs) => addrs,
            Err(err) => {
                tracing::warn!(error = %err, "hiro-api warm pass failed to list known addresses");
                return;
            }
        };
        let mut success = 0u32;
        let mut fail = 0u32;
        for addr in addresses {
            let endpoint = format!("/extended/v1/address/{addr}/balances");
            match self.passthrough(&endpoint, true).await {
                Ok(_) => success += 1,
                Err(_) => fail += 1,
            }
        }
        info!(
            actor = "hiro-api",
            success,
            fail,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cache warm pass complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_balances_and_assets_endpoints() {
        assert_eq!(
            parse_address_endpoint("/extended/v1/address/SP1ABC/balances"),
            Some(("SP1ABC", "balances"))
        );
        assert_eq!(
            parse_address_endpoint("/extended/v1/address/SP1ABC/assets"),
            Some(("SP1ABC", "assets"))
        );
        assert_eq!(parse_address_endpoint("/extended/v1/address/SP1ABC/nonces"), None);
        assert_eq!(parse_address_endpoint("/v2/info"), None);
    }
}
