//! The front door (§4.11): CORS preflight, the welcome descriptor, prefix
//! dispatch to the seven actors, and the catch-all 404.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{OriginalUri, Query, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use crate::actors::RouteActor;
use crate::handler_runtime::{apply_cors_headers, HandleOptions, HandlerRuntime};
use proxy_core::ApiError;

/// Everything a request needs to reach an actor.
pub struct AppState {
    pub hiro_api: Arc<dyn RouteActor>,
    pub stx_city: Arc<dyn RouteActor>,
    pub supabase: Arc<dyn RouteActor>,
    pub contract_calls: Arc<dyn RouteActor>,
    pub bns: Arc<dyn RouteActor>,
    pub chainhooks: Arc<dyn RouteActor>,
    pub stacks_account: Arc<dyn RouteActor>,
}

impl AppState {
    fn actors(&self) -> [(&'static str, &Arc<dyn RouteActor>); 7] {
        [
            ("/hiro-api", &self.hiro_api),
            ("/stx-city", &self.stx_city),
            ("/supabase", &self.supabase),
            ("/contract-calls", &self.contract_calls),
            ("/bns", &self.bns),
            ("/chainhooks", &self.chainhooks),
            ("/stacks-account", &self.stacks_account),
        ]
    }
}

const WELCOME_SERVICES: &[&str] = &[
    "/hiro-api",
    "/stx-city",
    "/supabase",
    "/contract-calls",
    "/bns",
    "/chainhooks",
    "/stacks-account",
];

/// Builds the axum `Router`, wiring every path through this single
/// catch-all handler so `HandlerRuntime` stays the one place that renders
/// a response.
pub fn build_router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .fallback(dispatch)
        .with_state(state)
}

async fn dispatch(
    State(state): State<Arc<AppState>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();

    if method == Method::OPTIONS {
        let mut response = axum::http::StatusCode::OK.into_response();
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let method_label = method.as_str().to_string();
    let path_label = path.clone();

    HandlerRuntime::handle(&method_label, &path_label, HandleOptions::default(), move || async move {
        if path == "/" && method == Method::GET {
            return Ok(welcome_descriptor());
        }

        let json_body = if body.is_empty() {
            None
        } else {
            Some(
                serde_json::from_slice::<Value>(&body)
                    .map_err(|e| ApiError::invalid_request(format!("malformed JSON body: {e}")))?,
            )
        };

        for (prefix, actor) in state.actors() {
            if let Some(endpoint) = path.strip_prefix(prefix) {
                if endpoint.is_empty() || endpoint.starts_with('/') {
                    return actor.dispatch(&method, endpoint, &query, json_body).await;
                }
            }
        }

        Err(ApiError::not_found(path.clone(), Default::default()))
    })
    .await
}

fn welcome_descriptor() -> Value {
    json!({
        "service": "edge-proxy",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": WELCOME_SERVICES,
    })
}
