//! The `/supabase` actor: cached aggregate stats from the stats database
//! (§6 route table).

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::Method;
use proxy_cache::CacheKeyBuilder;
use proxy_core::ApiError;
use proxy_fetcher::{FetchOptions, RateLimitedFetcher};
use serde_json::Value;

use super::{bust_cache_query, descriptor, endpoint_not_found, response_to_data, RouteActor};

const BASE_PATH: &str = "/supabase";
const CACHE_PREFIX: &str = "supabase_";
const SUPPORTED_ENDPOINTS: &[&str] = &["/stats"];

pub struct SupabaseActor {
    fetcher: RateLimitedFetcher,
}

impl SupabaseActor {
    pub fn new(fetcher: RateLimitedFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl RouteActor for SupabaseActor {
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
            return Err(ApiError::invalid_request("supabase only supports GET"));
        }
        if endpoint.is_empty() || endpoint == "/" {
            return Ok(descriptor("supabase", BASE_PATH, SUPPORTED_ENDPOINTS));
        }
        if endpoint != "/stats" {
            return Err(endpoint_not_found(endpoint, SUPPORTED_ENDPOINTS));
        }
        let cache_key = CacheKeyBuilder::path_key(CACHE_PREFIX, endpoint);
        let resp = self
            .fetcher
            .fetch(
                endpoint,
                &cache_key,
                FetchOptions {
                    bust_cache: bust_cache_query(query),
                    ..Default::default()
                },
            )
            .await?;
        Ok(response_to_data(&resp))
    }
}
