//! The `/contract-calls` actor: ABI lookups, read-only contract calls, the
//! `knownContracts` index, and standalone Clarity-value decoding
//! (§4.9, §6 route table).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use proxy_cache::{CacheKeyBuilder, KvStore};
use proxy_core::ApiError;
use proxy_fetcher::{
    decode, from_simplified, is_valid_stacks_address, ContractAbiStore, ContractCallFetcher,
    DecodeOptions, FetchOptions, FunctionAccess, Network,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::alarm::Warmable;
use super::{descriptor, endpoint_not_found, RouteActor};
use crate::known_index::{JsonSetIndex, KNOWN_CONTRACTS_KEY};

const BASE_PATH: &str = "/contract-calls";
const CACHE_PREFIX: &str = "contract-calls";
const SUPPORTED_ENDPOINTS: &[&str] = &[
    "/abi/{addr}/{name}",
    "/read-only/{addr}/{name}/{fn}",
    "/known-contracts",
    "/decode-clarity-value",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct KnownContract {
    #[serde(rename = "contractAddress")]
    contract_address: String,
    #[serde(rename = "contractName")]
    contract_name: String,
}

#[derive(Debug, Deserialize)]
struct CacheControl {
    #[serde(default)]
    bust_cache: bool,
    #[serde(default)]
    skip_cache: bool,
    ttl: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ReadOnlyBody {
    #[serde(rename = "functionArgs", default)]
    function_args: Vec<Value>,
    #[serde(default = "default_network")]
    network: String,
    #[serde(rename = "senderAddress")]
    sender_address: Option<String>,
    #[serde(rename = "strictJsonCompat", default = "default_true")]
    strict_json_compat: bool,
    #[serde(rename = "preserveContainers", default)]
    preserve_containers: bool,
    #[serde(rename = "cacheControl")]
    cache_control: Option<CacheControl>,
}

fn default_network() -> String {
    "mainnet".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct DecodeBody {
    value: Value,
    #[serde(rename = "strictJsonCompat", default = "default_true")]
    strict_json_compat: bool,
    #[serde(rename = "preserveContainers", default)]
    preserve_containers: bool,
}

pub struct ContractCallsActor {
    abi_store: ContractAbiStore,
    call_fetcher: ContractCallFetcher,
    known_contracts: JsonSetIndex,
    kv: Arc<dyn KvStore>,
}

impl ContractCallsActor {
    pub fn new(
        abi_store: ContractAbiStore,
        call_fetcher: ContractCallFetcher,
        kv: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            abi_store,
            call_fetcher,
            known_contracts: JsonSetIndex::new(kv.clone(), KNOWN_CONTRACTS_KEY),
            kv,
        }
    }

    async fn record_known_contract(&self, address: &str, name: &str) -> Result<(), ApiError> {
        self.known_contracts
            .insert(KnownContract {
                contract_address: address.to_string(),
                contract_name: name.to_string(),
            })
            .await?;
        Ok(())
    }

    async fn get_abi(&self, address: &str, name: &str) -> Result<Value, ApiError> {
        if !is_valid_stacks_address(address) {
            return Err(ApiError::invalid_contract_address(address));
        }
        self.record_known_contract(address, name).await?;
        let abi = self.abi_store.get(address, name).await?;
        serde_json::to_value(&abi).map_err(|e| ApiError::cache(format!("failed to encode ABI: {e}")))
    }

    async fn known_contracts_stats(&self) -> Result<Value, ApiError> {
        let storage: Vec<KnownContract> = self.known_contracts.list().await?;
        let mut cached = Vec::new();
        for contract in &storage {
            let key = format!(
                "contract_abi_{}_{}",
                contract.contract_address, contract.contract_name
            );
            if self.kv.get(&key).await?.is_some() {
                cached.push(contract.clone());
            }
        }
        Ok(json!({
            "stats": {"storage": storage.len(), "cached": cached.len()},
            "contracts": {"cached": cached},
        }))
    }

    async fn read_only(&self, address: &str, name: &str, function: &str, body: Value) -> Result<Value, ApiError> {
        if !is_valid_stacks_address(address) {
            return Err(ApiError::invalid_contract_address(address));
        }
        let body: ReadOnlyBody = serde_json::from_value(body)
            .map_err(|e| ApiError::invalid_request(format!("malformed request body: {e}")))?;
        let network = Network::parse(&body.network)
            .ok_or_else(|| ApiError::validation(format!("unknown network: {}", body.network)))?;

        self.record_known_contract(address, name).await?;

        let abi = self.abi_store.get(address, name).await?;
        let function_abi = abi
            .find_function(function)
            .ok_or_else(|| ApiError::invalid_function(function))?;
        if !matches!(function_abi.access, FunctionAccess::Public | FunctionAccess::ReadOnly) {
            return Err(ApiError::invalid_function(function));
        }
        if function_abi.args.len() != body.function_args.len() {
            return Err(ApiError::invalid_arguments(format!(
                "{function} expects {} argument(s), got {}",
                function_abi.args.len(),
                body.function_args.len()
            )));
        }

        let args = body
            .function_args
            .iter()
            .map(from_simplified)
            .collect::<Result<Vec<_>, _>>()?;

        let cache_key = CacheKeyBuilder::contract_call_key(
            CACHE_PREFIX,
            address,
            name,
            function,
            network.as_str(),
            &json!(body.function_args),
        );

        let decode_opts = DecodeOptions {
            strict_json_compat: body.strict_json_compat,
            preserve_containers: body.preserve_containers,
        };
        let fetch_opts = body
            .cache_control
            .map(|c| FetchOptions {
                bust_cache: c.bust_cache,
                skip_cache: c.skip_cache,
                ttl_override: c.ttl,
            })
            .unwrap_or_default();

        self.call_fetcher
            .call(
                address,
                name,
                function,
                args,
                network,
                body.sender_address,
                &cache_key,
                decode_opts,
                fetch_opts,
            )
            .await
    }

    fn decode_clarity_value(&self, body: Value) -> Result<Value, ApiError> {
        let body: DecodeBody = serde_json::from_value(body)
            .map_err(|e| ApiError::invalid_request(format!("malformed request body: {e}")))?;
        let clarity_value = from_simplified(&body.value)?;
        let decoded = decode(
            &clarity_value,
            DecodeOptions {
                strict_json_compat: body.strict_json_compat,
                preserve_containers: body.preserve_containers,
            },
        );
        Ok(json!({"original": body.value, "decoded": decoded}))
    }
}

/// `/abi/{addr}/{name}` → `Some((addr, name))`.
fn parse_abi_path(endpoint: &str) -> Option<(&str, &str)> {
    endpoint.strip_prefix("/abi/")?.split_once('/')
}

/// `/read-only/{addr}/{name}/{fn}` → `Some((addr, name, fn))`.
fn parse_read_only_path(endpoint: &str) -> Option<(&str, &str, &str)> {
    let rest = endpoint.strip_prefix("/read-only/")?;
    let mut parts = rest.splitn(3, '/');
    let addr = parts.next()?;
    let name = parts.next()?;
    let func = parts.next()?;
    if addr.is_empty() || name.is_empty() || func.is_empty() {
        return None;
    }
    Some((addr, name, func))
}

#[async_trait]
impl RouteActor for ContractCallsActor {
    fn base_path(&self) -> &'static str {
        BASE_PATH
    }

    async fn dispatch(
        &self,
        method: &Method,
        endpoint: &str,
        _query: &HashMap<String, String>,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        if endpoint.is_empty() || endpoint == "/" {
            return Ok(descriptor("contract-calls", BASE_PATH, SUPPORTED_ENDPOINTS));
        }

        // Recognize the endpoint's *shape* before deciding method mismatch (400)
        // vs unknown resource (404) — a GET to a read-only path or a POST to an
        // abi path is a known endpoint used the wrong way, not a missing one (B5).
        if endpoint == "/known-contracts" {
            if method != Method::GET {
                return Err(ApiError::invalid_request(
                    "GET is required for /known-contracts",
                ));
            }
            return self.known_contracts_stats().await;
        }
        if endpoint == "/decode-clarity-value" {
            if method != Method::POST {
                return Err(ApiError::invalid_request(
                    "POST is required for /decode-clarity-value",
                ));
            }
            let body = body.ok_or_else(|| {
                ApiError::invalid_request("decode-clarity-value requires a JSON body")
            })?;
            return self.decode_clarity_value(body);
        }
        if let Some((addr, name)) = parse_abi_path(endpoint) {
            if method != Method::GET {
                return Err(ApiError::invalid_request("GET is required for /abi/{addr}/{name}"));
            }
            return self.get_abi(addr, name).await;
        }
        if let Some((addr, name, func)) = parse_read_only_path(endpoint) {
            if method != Method::POST {
                return Err(ApiError::invalid_request(
                    "POST is required for /read-only/{addr}/{name}/{fn}",
                ));
            }
            let body =
                body.ok_or_else(|| ApiError::invalid_request("read-only call requires a JSON body"))?;
            return self.read_only(addr, name, func, body).await;
        }
        Err(endpoint_not_found(endpoint, SUPPORTED_ENDPOINTS))
    }
}

#[async_trait]
impl Warmable for ContractCallsActor {
    /// Walks every known contract and fetches its ABI through the ordinary
    /// skip-if-present getter (I6): a contract whose ABI is already cached
    /// is a no-op, so this only warms contracts never fetched before. It
    /// does not refresh a stale entry after a contract redeploy — there is
    /// no bust path on `ContractAbiStore`.
    async fn warm_once(&self) {
        let started = std::time::Instant::now();
        let contracts: Vec<KnownContract> = match self.known_contracts.list().await {
            Ok(c) => c,
            Err(err) => {
                tracing::warn!(error = %err, "contract-calls warm pass failed to list known contracts");
                return;
            }
        };
        let mut success = 0u32;
        let mut fail = 0u32;
        for contract in contracts {
            match self
                .abi_store
                .get(&contract.contract_address, &contract.contract_name)
                .await
            {
                Ok(_) => success += 1,
                Err(_) => fail += 1,
            }
        }
        tracing::info!(
            actor = "contract-calls",
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
    use async_trait::async_trait;
    use proxy_cache::{CacheStoreConfig, InMemoryKv};
    use proxy_fetcher::{AbiSource, ContractCallExecutor};
    use proxy_queue::RequestQueueConfig;
    use std::time::Duration;

    #[test]
    fn parses_abi_and_read_only_paths() {
        assert_eq!(parse_abi_path("/abi/SP1/pool"), Some(("SP1", "pool")));
        assert_eq!(
            parse_read_only_path("/read-only/SP1/pool/get-price"),
            Some(("SP1", "pool", "get-price"))
        );
        assert_eq!(parse_read_only_path("/read-only/SP1/pool"), None);
    }

    struct EmptyAbiSource;

    #[async_trait]
    impl AbiSource for EmptyAbiSource {
        async fn fetch_abi(&self, _address: &str, _contract_name: &str) -> Result<proxy_fetcher::ContractAbi, ApiError> {
            Ok(proxy_fetcher::ContractAbi { functions: vec![] })
        }
    }

    struct UnreachableExecutor;

    #[async_trait]
    impl ContractCallExecutor for UnreachableExecutor {
        async fn call_read_only(
            &self,
            _address: &str,
            _contract_name: &str,
            _function_name: &str,
            _args: &[proxy_fetcher::ClarityValue],
            _network: Network,
            _sender_address: Option<&str>,
        ) -> Result<proxy_fetcher::ClarityValue, ApiError> {
            panic!("dispatch test never performs a real call")
        }
    }

    fn test_actor() -> ContractCallsActor {
        let kv: Arc<dyn KvStore> = Arc::new(InMemoryKv::new());
        let abi_store = ContractAbiStore::new(kv.clone(), Arc::new(EmptyAbiSource));
        let queue_config = RequestQueueConfig {
            max_requests_per_interval: 10,
            interval: Duration::from_secs(1),
            max_retries: 0,
            retry_delay: Duration::from_millis(1),
            request_timeout: Duration::from_secs(1),
        };
        let call_fetcher = ContractCallFetcher::new(
            Arc::new(UnreachableExecutor),
            proxy_cache::CacheStore::new(kv.clone(), CacheStoreConfig::new(60)),
            proxy_queue::RequestQueue::new(queue_config),
            60,
        );
        ContractCallsActor::new(abi_store, call_fetcher, kv)
    }

    /// B5: a recognized endpoint shape used with the wrong method is a 400
    /// `INVALID_REQUEST`, not a 404 `NOT_FOUND`.
    #[tokio::test]
    async fn b5_wrong_method_on_recognized_endpoint_is_invalid_request_not_not_found() {
        let actor = test_actor();
        let empty_query = HashMap::new();

        let err = actor
            .dispatch(&Method::GET, "/read-only/SP1/pool/get-price", &empty_query, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, proxy_core::ErrorCode::InvalidRequest);

        let err = actor
            .dispatch(&Method::POST, "/abi/SP1/pool", &empty_query, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, proxy_core::ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn unrecognized_endpoint_shape_is_not_found() {
        let actor = test_actor();
        let empty_query = HashMap::new();
        let err = actor
            .dispatch(&Method::GET, "/nonsense", &empty_query, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, proxy_core::ErrorCode::NotFound);
    }
}
