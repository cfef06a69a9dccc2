//! The `/chainhooks` actor: a webhook event sink backed by durable actor
//! storage (§6 route table: `event_{uuid}`).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use proxy_cache::KvStore;
use proxy_core::ApiError;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{descriptor, endpoint_not_found, RouteActor};

const BASE_PATH: &str = "/chainhooks";
const EVENT_PREFIX: &str = "event_";
const SUPPORTED_ENDPOINTS: &[&str] = &["/post-event", "/events", "/events/{id}"];

pub struct ChainhooksActor {
    kv: Arc<dyn KvStore>,
}

impl ChainhooksActor {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    async fn post_event(&self, body: Value) -> Result<Value, ApiError> {
        let id = Uuid::new_v4();
        let key = format!("{EVENT_PREFIX}{id}");
        let bytes = serde_json::to_vec(&body)
            .map_err(|e| ApiError::cache(format!("failed to encode event: {e}")))?;
        self.kv.put(&key, bytes, None).await?;
        Ok(json!({"message": "event stored", "eventId": id.to_string()}))
    }

    async fn list_events(&self) -> Result<Value, ApiError> {
        let (keys, _cursor) = self.kv.list(EVENT_PREFIX, None).await?;
        let mut events = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(bytes) = self.kv.get(&key).await? {
                let event: Value = serde_json::from_slice(&bytes)
                    .map_err(|e| ApiError::cache(format!("corrupt event at {key}: {e}")))?;
                let id = key.strip_prefix(EVENT_PREFIX).unwrap_or(&key);
                events.push(json!({"id": id, "event": event}));
            }
        }
        Ok(Value::Array(events))
    }

    async fn get_event(&self, id: &str) -> Result<Value, ApiError> {
        let key = format!("{EVENT_PREFIX}{id}");
        let Some(bytes) = self.kv.get(&key).await? else {
            return Err(ApiError::not_found(format!("event {id}"), HashMap::new()));
        };
        let event: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::cache(format!("corrupt event at {key}: {e}")))?;
        Ok(json!({"id": id, "event": event}))
    }
}

#[async_trait]
impl RouteActor for ChainhooksActor {
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
            return Ok(descriptor("chainhooks", BASE_PATH, SUPPORTED_ENDPOINTS));
        }

        if method == Method::POST && endpoint == "/post-event" {
            let body = body.ok_or_else(|| ApiError::invalid_request("post-event requires a JSON body"))?;
            return self.post_event(body).await;
        }
        if method == Method::GET && endpoint == "/events" {
            return self.list_events().await;
        }
        if method == Method::GET {
            if let Some(id) = endpoint.strip_prefix("/events/").filter(|id| !id.is_empty()) {
                return self.get_event(id).await;
            }
        }
        Err(endpoint_not_found(endpoint, SUPPORTED_ENDPOINTS))
    }
}
