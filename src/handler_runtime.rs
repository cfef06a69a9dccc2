//! The single place that turns a handler's `Result<Value, ApiError>` into
//! an HTTP response (§4.10). No handler writes its own response body on an
//! error path; everything goes through [`HandlerRuntime::handle`], which
//! also catches a panic inside `work` (via a `tokio::spawn` join boundary)
//! and converts it into a 500 `INTERNAL_ERROR` envelope — §4.10's "any
//! other throwable" path.

use std::future::Future;
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use proxy_core::ApiError;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const DEFAULT_SLOW_THRESHOLD_MS: u64 = 1000;

/// Context passed in purely for logging; doesn't affect dispatch.
#[derive(Debug, Clone, Copy)]
pub struct HandleOptions {
    pub slow_threshold_ms: u64,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self {
            slow_threshold_ms: DEFAULT_SLOW_THRESHOLD_MS,
        }
    }
}

pub struct HandlerRuntime;

impl HandlerRuntime {
    /// Runs `work`, logs its outcome, and renders it as an HTTP response
    /// with the standard success/error envelope (§6) and CORS headers.
    ///
    /// `work` runs on its own tokio task so a panic inside it surfaces as a
    /// `JoinError` here rather than taking down the server; that panic is
    /// logged at ERROR and rendered as `INTERNAL_ERROR` (§4.10, §7: "ERROR
    /// on any exception reaching HandlerRuntime").
    pub async fn handle<F, Fut>(method: &str, path: &str, opts: HandleOptions, work: F) -> Response
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        let request_id = Uuid::new_v4();
        info!(%request_id, method, path, "request started");

        let started_at = Instant::now();
        let outcome = match tokio::spawn(work()).await {
            Ok(result) => result,
            Err(join_err) => {
                error!(%request_id, error = %join_err, "handler panicked");
                Err(ApiError::internal("an unexpected internal error occurred"))
            }
        };
        let elapsed = started_at.elapsed();

        match outcome {
            Ok(data) => {
                log_completion(&request_id, elapsed, opts.slow_threshold_ms);
                success_response(data)
            }
            Err(err) => {
                if err.code == proxy_core::ErrorCode::InternalError {
                    error!(
                        %request_id,
                        code = %err.code,
                        error_id = %err.id,
                        message = %err.message,
                        "request failed"
                    );
                } else {
                    warn!(
                        %request_id,
                        code = %err.code,
                        error_id = %err.id,
                        message = %err.message,
                        details = ?err.details,
                        "request failed"
                    );
                }
                error_response(&err)
            }
        }
    }
}

fn log_completion(request_id: &Uuid, elapsed: Duration, slow_threshold_ms: u64) {
    let elapsed_ms = elapsed.as_millis() as u64;
    if elapsed_ms > slow_threshold_ms {
        warn!(%request_id, elapsed_ms, "slow request");
    } else {
        debug!(%request_id, elapsed_ms, "request completed");
    }
}

fn success_response(data: Value) -> Response {
    let body = json!({"success": true, "data": data});
    let mut response = (StatusCode::OK, Json(body)).into_response();
    apply_cors_headers(response.headers_mut());
    response
}

fn error_response(err: &ApiError) -> Response {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = json!({
        "success": false,
        "error": {
            "id": err.id.to_string(),
            "code": err.code,
            "message": err.message,
            "details": err.details,
        }
    });
    let mut response = (status, Json(body)).into_response();
    apply_cors_headers(response.headers_mut());
    response
}

/// Also used directly by the router for `OPTIONS` preflight (§4.11 step 1)
/// and by every successful/error response above.
pub fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET, HEAD, POST, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers.insert(
        "access-control-max-age",
        HeaderValue::from_static("86400"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn ok_work_renders_success_envelope() {
        let response = HandlerRuntime::handle("GET", "/x", HandleOptions::default(), || async {
            Ok(json!({"a": 1}))
        })
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed, json!({"success": true, "data": {"a": 1}}));
    }

    #[tokio::test]
    async fn panicking_work_renders_internal_error_not_a_crash() {
        let response = HandlerRuntime::handle("GET", "/x", HandleOptions::default(), || async {
            panic!("boom");
            #[allow(unreachable_code)]
            Ok(Value::Null)
        })
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["success"], Value::Bool(false));
        assert_eq!(parsed["error"]["code"], json!("INTERNAL_ERROR"));
    }
}
