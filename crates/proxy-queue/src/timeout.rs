//! The timeout utility (§4.5): race a future against a deadline.
//!
//! Used to bound both the per-request upstream fetch and the queued
//! closure's own execution, independently, so a pathological in-queue
//! closure still terminates even if the upstream call inside it somehow
//! doesn't.

use std::future::Future;
use std::time::Duration;

use proxy_core::ApiError;

/// Runs `fut` under a deadline of `ms` milliseconds.
///
/// On timeout, returns `ApiError::timeout(ms, message)` rather than the
/// future's own error type — callers that need the underlying error on
/// success simply get it back unchanged.
pub async fn with_timeout<F, T>(
    ms: u64,
    message: &str,
    fut: F,
) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match tokio::time::timeout(Duration::from_millis(ms), fut).await {
        Ok(result) => result,
        Err(_elapsed) => Err(ApiError::timeout(ms, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_before_deadline() {
        let result = with_timeout(1000, "slow op", async { Ok::<_, ApiError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_past_deadline() {
        let result = with_timeout(10, "slow op", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ApiError>(42)
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.code, proxy_core::ErrorCode::TimeoutError);
    }
}
