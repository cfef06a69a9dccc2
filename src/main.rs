//! Process entry point: logging, configuration, actor wiring, and the
//! axum server with graceful shutdown (SPEC_FULL §11).

mod chain_stub;

use std::sync::Arc;
use std::time::Duration;

use edge_proxy::actors::alarm::{spawn_alarm_loop, AlarmConfig};
use edge_proxy::actors::bns::BnsActor;
use edge_proxy::actors::chainhooks::ChainhooksActor;
use edge_proxy::actors::contract_calls::ContractCallsActor;
use edge_proxy::actors::hiro_api::HiroApiActor;
use edge_proxy::actors::stacks_account::StacksAccountActor;
use edge_proxy::actors::stx_city::StxCityActor;
use edge_proxy::actors::supabase::SupabaseActor;
use edge_proxy::router::{build_router, AppState};
use proxy_cache::{CacheStore, CacheStoreConfig, InMemoryKv, KvStore};
use proxy_core::{init_logging, AppConfig, LogEntry};
use proxy_fetcher::{ContractAbiStore, ContractCallFetcher, RateLimitedFetcher};
use proxy_queue::RequestQueue;
use reqwest::header::{HeaderMap, HeaderValue};

use chain_stub::UnconfiguredChainClient;

/// Default JSON cache TTL for passthrough responses.
const DEFAULT_TTL_SECONDS: u64 = 60;

#[tokio::main]
async fn main() {
    // Production deployments inject their own `KvStore`; this binary uses
    // an in-process one since the real backend is external infrastructure
    // (§1 glossary: "KV: an opaque external key-value store").
    let kv: Arc<dyn KvStore> = Arc::new(InMemoryKv::new());

    init_logging(kv_log_sink(kv.clone()));

    let config = AppConfig::get().expect("failed to resolve AppConfig from the environment");

    let app_state = Arc::new(build_app_state(config, kv));

    let router = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {e}", config.bind_addr));

    tracing::info!(addr = %config.bind_addr, "edge-proxy listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

fn kv_log_sink(kv: Arc<dyn KvStore>) -> impl Fn(LogEntry) + Send + Sync + 'static {
    move |entry: LogEntry| {
        let kv = kv.clone();
        tokio::spawn(async move {
            let key = entry.kv_key();
            if let Ok(bytes) = serde_json::to_vec(&entry) {
                let _ = kv.put(&key, bytes, Some(LogEntry::KV_TTL_SECS)).await;
            }
        });
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .build()
        .expect("failed to build HTTP client")
}

fn hiro_headers(config: &AppConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(key) = &config.hiro_api_key {
        if let Ok(value) = HeaderValue::from_str(key) {
            headers.insert("x-api-key", value);
        }
    }
    headers
}

fn build_app_state(config: &'static AppConfig, kv: Arc<dyn KvStore>) -> AppState {
    let client = http_client();
    let cache = CacheStore::new(kv.clone(), CacheStoreConfig::new(DEFAULT_TTL_SECONDS));

    let hiro_queue = RequestQueue::new(proxy_queue::RequestQueueConfig {
        max_requests_per_interval: 50,
        interval: Duration::from_secs(1),
        max_retries: 3,
        retry_delay: Duration::from_millis(200),
        request_timeout: Duration::from_secs(5),
    });
    let hiro_fetcher = RateLimitedFetcher::new(
        client.clone(),
        config.hiro_api_base_url.clone(),
        DEFAULT_TTL_SECONDS,
        cache.clone(),
        hiro_queue,
        hiro_headers(config),
    );
    let hiro_api = HiroApiActor::new(hiro_fetcher, kv.clone());
    let hiro_api_alarm = AlarmConfig::enabled_every(Duration::from_secs(15 * 60));

    let stx_city_queue = RequestQueue::new(proxy_queue::RequestQueueConfig {
        max_requests_per_interval: 20,
        interval: Duration::from_secs(1),
        max_retries: 2,
        retry_delay: Duration::from_millis(250),
        request_timeout: Duration::from_secs(5),
    });
    let stx_city_fetcher = RateLimitedFetcher::new(
        client.clone(),
        config.stx_city_base_url.clone(),
        DEFAULT_TTL_SECONDS,
        cache.clone(),
        stx_city_queue,
        HeaderMap::new(),
    );
    let stx_city = StxCityActor::new(stx_city_fetcher);

    let supabase_queue = RequestQueue::new(proxy_queue::RequestQueueConfig {
        max_requests_per_interval: 20,
        interval: Duration::from_secs(1),
        max_retries: 2,
        retry_delay: Duration::from_millis(250),
        request_timeout: Duration::from_secs(5),
    });
    let mut supabase_headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&config.stats_db_service_key) {
        supabase_headers.insert("apikey", value);
    }
    let supabase_fetcher = RateLimitedFetcher::new(
        client.clone(),
        config.stats_db_url.clone(),
        DEFAULT_TTL_SECONDS,
        cache.clone(),
        supabase_queue,
        supabase_headers,
    );
    let supabase = SupabaseActor::new(supabase_fetcher);

    let bns_queue = RequestQueue::new(proxy_queue::RequestQueueConfig {
        max_requests_per_interval: 20,
        interval: Duration::from_secs(1),
        max_retries: 2,
        retry_delay: Duration::from_millis(250),
        request_timeout: Duration::from_secs(5),
    });
    let bns_fetcher = RateLimitedFetcher::new(
        client.clone(),
        config.hiro_api_base_url.clone(),
        DEFAULT_TTL_SECONDS,
        cache.clone(),
        bns_queue,
        hiro_headers(config),
    );
    let bns = BnsActor::new(bns_fetcher);

    let account_queue = RequestQueue::new(proxy_queue::RequestQueueConfig {
        max_requests_per_interval: 20,
        interval: Duration::from_secs(1),
        max_retries: 2,
        retry_delay: Duration::from_millis(250),
        request_timeout: Duration::from_secs(5),
    });
    let account_fetcher = RateLimitedFetcher::new(
        client.clone(),
        config.stacks_node_base_url.clone(),
        DEFAULT_TTL_SECONDS,
        cache.clone(),
        account_queue,
        hiro_headers(config),
    );
    let stacks_account = StacksAccountActor::new(account_fetcher, kv.clone());

    let chain_client = Arc::new(UnconfiguredChainClient);
    let abi_store = ContractAbiStore::new(kv.clone(), chain_client.clone());
    let call_queue = RequestQueue::new(proxy_queue::RequestQueueConfig {
        max_requests_per_interval: 10,
        interval: Duration::from_secs(1),
        max_retries: 2,
        retry_delay: Duration::from_millis(250),
        request_timeout: Duration::from_secs(10),
    });
    let call_fetcher = ContractCallFetcher::new(chain_client, cache.clone(), call_queue, DEFAULT_TTL_SECONDS);
    let contract_calls = ContractCallsActor::new(abi_store, call_fetcher, kv.clone());
    let contract_calls_alarm = AlarmConfig::enabled_every(Duration::from_secs(15 * 60));

    let chainhooks = ChainhooksActor::new(kv.clone());

    let hiro_api = Arc::new(hiro_api);
    let contract_calls = Arc::new(contract_calls);

    spawn_alarm_loop(hiro_api_alarm, hiro_api.clone());
    spawn_alarm_loop(contract_calls_alarm, contract_calls.clone());
    // `bns`, `stx-city`, `supabase`, `stacks-account`, and `chainhooks` have
    // no natural warm set and keep their alarm disabled by default
    // (SPEC_FULL §13).

    AppState {
        hiro_api,
        stx_city: Arc::new(stx_city),
        supabase: Arc::new(supabase),
        contract_calls,
        bns: Arc::new(bns),
        chainhooks: Arc::new(chainhooks),
        stacks_account: Arc::new(stacks_account),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections");
}
