//! The error taxonomy (§7) and its single conversion point to an HTTP
//! response.
//!
//! Every typed failure in the system is an [`ApiError`]. Deep code throws
//! one of these (or a collaborator error that converts into one); only
//! `HandlerRuntime` turns it into bytes on the wire, so no handler writes
//! its own error response.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// The closed set of failure categories the system can produce.
///
/// Each variant names its HTTP status in a doc comment; [`ErrorCode::http_status`]
/// is the single source of truth used by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// 500 — uncategorized.
    InternalError,
    /// 404 — resource / route / endpoint missing.
    NotFound,
    /// 400 — wrong method, malformed path.
    InvalidRequest,
    /// 401 — reserved; not currently emitted.
    Unauthorized,
    /// 429 — upstream rate limit exceeded.
    RateLimitExceeded,
    /// 502 — upstream 5xx or a transport failure in the fetch closure.
    UpstreamApiError,
    /// 400 — Clarity-value conversion/validation failure.
    ValidationError,
    /// 400 — address failed syntactic check.
    InvalidContractAddress,
    /// 400 — function name not in ABI, or not read-only/public.
    InvalidFunction,
    /// 400 — argument count mismatch.
    InvalidArguments,
    /// 500 — KV get/put/list failed.
    CacheError,
    /// 500 — uninitialized singleton / missing env var.
    ConfigError,
    /// 500 — request or queued closure exceeded its deadline.
    TimeoutError,
}

impl ErrorCode {
    /// The HTTP status this code is rendered with.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::InternalError => 500,
            ErrorCode::NotFound => 404,
            ErrorCode::InvalidRequest => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::RateLimitExceeded => 429,
            ErrorCode::UpstreamApiError => 502,
            ErrorCode::ValidationError => 400,
            ErrorCode::InvalidContractAddress => 400,
            ErrorCode::InvalidFunction => 400,
            ErrorCode::InvalidArguments => 400,
            ErrorCode::CacheError => 500,
            ErrorCode::ConfigError => 500,
            // §7: surfaced as 500 with the code visible, not 504.
            ErrorCode::TimeoutError => 500,
        }
    }

    /// `true` for the two retryable classes the queue treats specially (§4.4, §7).
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCode::UpstreamApiError | ErrorCode::TimeoutError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A typed failure, carrying enough context for both the HTTP error
/// envelope (§6) and a structured log line (§3).
#[derive(Debug, Clone)]
pub struct ApiError {
    pub id: Uuid,
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn not_found(resource: impl Into<String>, details: HashMap<String, Value>) -> Self {
        let resource = resource.into();
        Self {
            id: Uuid::new_v4(),
            code: ErrorCode::NotFound,
            message: format!("resource not found: {resource}"),
            details,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn invalid_contract_address(address: impl Into<String>) -> Self {
        let address = address.into();
        Self::new(
            ErrorCode::InvalidContractAddress,
            format!("not a valid Stacks address: {address}"),
        )
        .with_detail("address", address)
    }

    pub fn invalid_function(function: impl Into<String>) -> Self {
        let function = function.into();
        Self::new(
            ErrorCode::InvalidFunction,
            format!("function not found or not callable: {function}"),
        )
        .with_detail("function", function)
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArguments, message)
    }

    pub fn timeout(ms: u64, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TimeoutError, message).with_detail("ms", ms)
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::new(ErrorCode::RateLimitExceeded, "upstream rate limit exceeded")
            .with_detail("retryAfter", retry_after_secs)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamApiError, message)
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CacheError, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// §4.10's "any other throwable" path: an uncategorized failure that
    /// reached `HandlerRuntime` (typically a caught panic).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.id, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_matches_taxonomy() {
        assert_eq!(ErrorCode::NotFound.http_status(), 404);
        assert_eq!(ErrorCode::RateLimitExceeded.http_status(), 429);
        assert_eq!(ErrorCode::UpstreamApiError.http_status(), 502);
        assert_eq!(ErrorCode::TimeoutError.http_status(), 500);
    }

    #[test]
    fn only_upstream_and_timeout_are_retryable() {
        assert!(ErrorCode::UpstreamApiError.is_retryable());
        assert!(ErrorCode::TimeoutError.is_retryable());
        assert!(!ErrorCode::ValidationError.is_retryable());
        assert!(!ErrorCode::InvalidArguments.is_retryable());
    }

    #[test]
    fn with_detail_round_trips_through_json() {
        let err = ApiError::rate_limited(60);
        assert_eq!(err.details.get("retryAfter").unwrap(), &Value::from(60));
    }

    #[test]
    fn internal_produces_internal_error_code() {
        let err = ApiError::internal("panic caught in handler");
        assert_eq!(err.code, ErrorCode::InternalError);
        assert_eq!(err.code.http_status(), 500);
    }
}
