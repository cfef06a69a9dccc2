//! The rate-limited HTTP fetcher (§4.6) and its contract-call
//! specialization (§4.7).

use std::sync::Arc;
use std::time::{Duration, Instant};

use proxy_cache::CacheStore;
use proxy_core::ApiError;
use proxy_queue::RequestQueue;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::warn;

use crate::address::Network;
use crate::clarity::{decode, ClarityValue, DecodeOptions};
use crate::executor::ContractCallExecutor;

/// The result of a passthrough fetch: the upstream's status and raw text
/// body. A non-2xx, non-429, non-5xx status (plain "other 4xx") is
/// returned here rather than as an `Err` — it is a non-retryable
/// *success-shaped* response (§4.6 step 2, Open Question D resolution).
#[derive(Debug, Clone)]
pub struct ResponseBody {
    pub status: u16,
    pub body: String,
}

/// Per-call overrides accepted by both fetcher flavors.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    pub bust_cache: bool,
    pub skip_cache: bool,
    pub ttl_override: Option<u64>,
}

/// `{upstreamBaseUrl, CacheStore, RequestQueue, minSpacingMs}` (§4.6). The
/// minimum spacing lives inside the queue's own config
/// ([`proxy_queue::RequestQueueConfig::min_request_spacing`]).
pub struct RateLimitedFetcher {
    client: reqwest::Client,
    upstream_base_url: String,
    default_ttl_seconds: u64,
    cache: CacheStore,
    queue: RequestQueue<ResponseBody>,
    headers: HeaderMap,
}

impl RateLimitedFetcher {
    pub fn new(
        client: reqwest::Client,
        upstream_base_url: impl Into<String>,
        default_ttl_seconds: u64,
        cache: CacheStore,
        queue: RequestQueue<ResponseBody>,
        headers: HeaderMap,
    ) -> Self {
        Self {
            client,
            upstream_base_url: upstream_base_url.into(),
            default_ttl_seconds,
            cache,
            queue,
            headers,
        }
    }

    /// `Fetch(endpoint, cacheKey, bustCache=false, skipCache=false, ttlOverride?) → ResponseBody` (§4.6).
    pub async fn fetch(
        &self,
        endpoint: &str,
        cache_key: &str,
        opts: FetchOptions,
    ) -> Result<ResponseBody, ApiError> {
        if !opts.bust_cache {
            if let Some(body) = self.cache.get::<String>(cache_key).await? {
                return Ok(ResponseBody { status: 200, body });
            }
        }

        let client = self.client.clone();
        let url = format!("{}{}", self.upstream_base_url, endpoint);
        let headers = self.headers.clone();
        let cache = self.cache.clone();
        let cache_key = cache_key.to_string();
        let default_ttl = self.default_ttl_seconds;

        self.queue
            .enqueue(move || {
                let client = client.clone();
                let url = url.clone();
                let headers = headers.clone();
                let cache = cache.clone();
                let cache_key = cache_key.clone();
                async move { run_fetch(client, url, headers, cache, cache_key, opts, default_ttl).await }
            })
            .await
    }
}

async fn run_fetch(
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    cache: CacheStore,
    cache_key: String,
    opts: FetchOptions,
    default_ttl: u64,
) -> Result<ResponseBody, ApiError> {
    let started = Instant::now();
    let response = client
        .get(&url)
        .headers(headers)
        .send()
        .await
        .map_err(|e| ApiError::upstream(format!("request to {url} failed: {e}")))?;
    let elapsed = started.elapsed();
    if elapsed > Duration::from_millis(1000) {
        warn!(url, elapsed_ms = elapsed.as_millis() as u64, "slow upstream response");
    }

    let status = response.status();
    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(ApiError::rate_limited(retry_after));
    }
    if status.is_server_error() {
        return Err(ApiError::upstream(format!("upstream {url} returned {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| ApiError::upstream(format!("failed to read body from {url}: {e}")))?;

    if status.is_client_error() {
        return Ok(ResponseBody {
            status: status.as_u16(),
            body,
        });
    }

    if !opts.skip_cache {
        let ttl = opts.ttl_override.unwrap_or(default_ttl);
        cache.set(&cache_key, &body, Some(ttl)).await?;
    }
    Ok(ResponseBody {
        status: status.as_u16(),
        body,
    })
}

/// The read-only contract-call specialization (§4.7): same queue/retry/cache
/// discipline, but the queued closure invokes a [`ContractCallExecutor`]
/// instead of performing an HTTP GET, and the cached value is the decoded
/// JSON result rather than a raw response body.
pub struct ContractCallFetcher {
    executor: Arc<dyn ContractCallExecutor>,
    cache: CacheStore,
    queue: RequestQueue<Value>,
    default_ttl_seconds: u64,
}

impl ContractCallFetcher {
    pub fn new(
        executor: Arc<dyn ContractCallExecutor>,
        cache: CacheStore,
        queue: RequestQueue<Value>,
        default_ttl_seconds: u64,
    ) -> Self {
        Self {
            executor,
            cache,
            queue,
            default_ttl_seconds,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn call(
        &self,
        address: &str,
        contract_name: &str,
        function_name: &str,
        args: Vec<ClarityValue>,
        network: Network,
        sender_address: Option<String>,
        cache_key: &str,
        decode_opts: DecodeOptions,
        opts: FetchOptions,
    ) -> Result<Value, ApiError> {
        if !opts.bust_cache {
            if let Some(cached) = self.cache.get::<Value>(cache_key).await? {
                return Ok(cached);
            }
        }

        let executor = self.executor.clone();
        let address = address.to_string();
        let contract_name = contract_name.to_string();
        let function_name = function_name.to_string();
        let cache = self.cache.clone();
        let cache_key = cache_key.to_string();
        let default_ttl = self.default_ttl_seconds;

        self.queue
            .enqueue(move || {
                let executor = executor.clone();
                let address = address.clone();
                let contract_name = contract_name.clone();
                let function_name = function_name.clone();
                let args = args.clone();
                let sender_address = sender_address.clone();
                let cache = cache.clone();
                let cache_key = cache_key.clone();
                async move {
                    let started = Instant::now();
                    let result = executor
                        .call_read_only(
                            &address,
                            &contract_name,
                            &function_name,
                            &args,
                            network,
                            sender_address.as_deref(),
                        )
                        .await?;
                    let elapsed = started.elapsed();
                    if elapsed > Duration::from_millis(1000) {
                        warn!(
                            address,
                            contract_name,
                            function_name,
                            elapsed_ms = elapsed.as_millis() as u64,
                            "slow contract call"
                        );
                    }
                    let decoded = decode(&result, decode_opts);
                    if !opts.skip_cache {
                        let ttl = opts.ttl_override.unwrap_or(default_ttl);
                        cache.set(&cache_key, &decoded, Some(ttl)).await?;
                    }
                    Ok(decoded)
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use proxy_cache::{CacheStoreConfig, InMemoryKv};
    use proxy_queue::RequestQueueConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubExecutor {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ContractCallExecutor for StubExecutor {
        async fn call_read_only(
            &self,
            _address: &str,
            _contract_name: &str,
            _function_name: &str,
            _args: &[ClarityValue],
            _network: Network,
            _sender_address: Option<&str>,
        ) -> Result<ClarityValue, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ClarityValue::UInt(num_bigint::BigInt::from(7)))
        }
    }

    fn queue_config() -> RequestQueueConfig {
        RequestQueueConfig {
            max_requests_per_interval: 100,
            interval: Duration::from_millis(100),
            max_retries: 2,
            retry_delay: Duration::from_millis(5),
            request_timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn contract_call_caches_decoded_result() {
        let executor = Arc::new(StubExecutor {
            calls: AtomicU32::new(0),
        });
        let cache = CacheStore::new(Arc::new(InMemoryKv::new()), CacheStoreConfig::new(60));
        let queue = RequestQueue::<Value>::new(queue_config());
        let fetcher = ContractCallFetcher::new(executor.clone(), cache, queue, 60);

        let first = fetcher
            .call(
                "SP1",
                "pool",
                "get-price",
                vec![],
                Network::Mainnet,
                None,
                "contract-calls_call_SP1_pool_get-price_mainnet_abc",
                DecodeOptions::default(),
                FetchOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(first, Value::String("7".to_string()));

        let second = fetcher
            .call(
                "SP1",
                "pool",
                "get-price",
                vec![],
                Network::Mainnet,
                None,
                "contract-calls_call_SP1_pool_get-price_mainnet_abc",
                DecodeOptions::default(),
                FetchOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(second, Value::String("7".to_string()));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }
}
