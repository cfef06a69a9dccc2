//! The seven per-upstream `RouteActor`s (§4.8) and the scaffolding they
//! share: the common dispatch trait, the endpoint descriptor shape
//! (SPEC_FULL §12), and alarm-driven cache warming (§4.8 "Alarm handler").

pub mod alarm;
pub mod bns;
pub mod chainhooks;
pub mod contract_calls;
pub mod hiro_api;
pub mod stacks_account;
pub mod stx_city;
pub mod supabase;

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::Method;
use proxy_core::ApiError;
use proxy_fetcher::ResponseBody;
use serde_json::{json, Value};

/// Common per-upstream dispatch contract (§4.8 "Fetch dispatch").
#[async_trait]
pub trait RouteActor: Send + Sync {
    fn base_path(&self) -> &'static str;

    /// `endpoint` is the request path with `base_path` already stripped
    /// (still leading-slash-prefixed, or empty for the bare base path).
    async fn dispatch(
        &self,
        method: &Method,
        endpoint: &str,
        query: &HashMap<String, String>,
        body: Option<Value>,
    ) -> Result<Value, ApiError>;
}

/// The shared descriptor shape for an actor's bare/`"/"` endpoint
/// (SPEC_FULL §12).
pub fn descriptor(actor: &str, base_path: &str, endpoints: &[&str]) -> Value {
    json!({"actor": actor, "basePath": base_path, "endpoints": endpoints})
}

/// A `NOT_FOUND` for an endpoint that doesn't match the actor's allow-list
/// (§4.8 step 3).
pub fn endpoint_not_found(endpoint: &str, supported_endpoints: &[&str]) -> ApiError {
    let mut details = HashMap::new();
    details.insert("resource".to_string(), json!(endpoint));
    details.insert("supportedEndpoints".to_string(), json!(supported_endpoints));
    ApiError::not_found(endpoint, details)
}

/// Renders a passthrough fetch result as envelope data: the parsed JSON
/// body for a 2xx (falling back to the raw text if it isn't JSON), or
/// `{status, body}` for the non-retryable 4xx-passthrough case (§4.6 step
/// 2, Open Question D resolution).
pub fn response_to_data(resp: &ResponseBody) -> Value {
    if resp.status < 300 {
        serde_json::from_str(&resp.body).unwrap_or_else(|_| Value::String(resp.body.clone()))
    } else {
        json!({"status": resp.status, "body": resp.body})
    }
}

pub fn bust_cache_query(query: &HashMap<String, String>) -> bool {
    query
        .get("bustCache")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_to_data_parses_json_on_2xx() {
        let resp = ResponseBody {
            status: 200,
            body: r#"{"a":1}"#.to_string(),
        };
        assert_eq!(response_to_data(&resp), json!({"a": 1}));
    }

    #[test]
    fn response_to_data_wraps_4xx_as_status_and_body() {
        let resp = ResponseBody {
            status: 404,
            body: "not found upstream".to_string(),
        };
        assert_eq!(
            response_to_data(&resp),
            json!({"status": 404, "body": "not found upstream"})
        );
    }
}
