//! The single-consumer FIFO request queue (§4.4).
//!
//! Admission requires both a token from the paired [`TokenBucket`] and that
//! `min_request_spacing` has elapsed since the last admitted request.
//! Retried requests re-queue to the **tail** (§4.4, invariant I3): this
//! trades strict head-of-line fairness for throughput under a flaky
//! upstream, since a persistently failing request then cannot starve the
//! rest of the queue.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use proxy_core::ApiError;
use proxy_ratelimiter::{TokenBucket, TokenBucketConfig};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// A boxed, re-invokable async closure: one call per attempt, so retries
/// simply call it again.
pub type Execute<T> =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send>> + Send + Sync>;

/// Configuration for a [`RequestQueue`].
#[derive(Debug, Clone, Copy)]
pub struct RequestQueueConfig {
    pub max_requests_per_interval: usize,
    pub interval: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
}

impl RequestQueueConfig {
    /// `min_request_spacing_ms = max(250, floor(interval_ms / max_requests_per_interval))`.
    pub fn min_request_spacing(&self) -> Duration {
        let interval_ms = self.interval.as_millis().max(1) as u64;
        let per_request = interval_ms / self.max_requests_per_interval.max(1) as u64;
        Duration::from_millis(per_request.max(250))
    }
}

struct QueuedRequest<T> {
    id: Uuid,
    queued_at: Instant,
    retry_count: u32,
    execute: Execute<T>,
    resolver: oneshot::Sender<Result<T, ApiError>>,
}

struct Inner<T> {
    items: VecDeque<QueuedRequest<T>>,
    bucket: TokenBucket,
    last_request_at: Option<Instant>,
}

/// A FIFO work queue admitted under a token bucket with retry/backoff and
/// per-closure timeout (§4.4).
pub struct RequestQueue<T> {
    inner: Arc<Mutex<Inner<T>>>,
    config: RequestQueueConfig,
    running: Arc<AtomicBool>,
}

impl<T> Clone for RequestQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: self.config,
            running: self.running.clone(),
        }
    }
}

impl<T: Send + 'static> RequestQueue<T> {
    pub fn new(config: RequestQueueConfig) -> Self {
        let bucket = TokenBucket::new(TokenBucketConfig::requests_per_interval(
            config.max_requests_per_interval,
            config.interval,
        ));
        Self {
            inner: Arc::new(Mutex::new(Inner {
                items: VecDeque::new(),
                bucket,
                last_request_at: None,
            })),
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enqueues `execute` and awaits its eventual result (possibly after
    /// retries). Ordering guarantee: for two enqueues A then B from the same
    /// caller, A is admitted before B (§4.4 "Ordering guarantees").
    pub async fn enqueue<F, Fut>(&self, execute: F) -> Result<T, ApiError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let item = QueuedRequest {
            id: Uuid::new_v4(),
            queued_at: Instant::now(),
            retry_count: 0,
            execute: Arc::new(move || Box::pin(execute())),
            resolver: tx,
        };
        {
            let mut inner = self.inner.lock().await;
            inner.items.push_back(item);
        }
        self.spawn_admission_loop_if_idle();

        rx.await
            .unwrap_or_else(|_| Err(ApiError::upstream("request queue dropped the response")))
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.items.len()
    }

    fn spawn_admission_loop_if_idle(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let inner = self.inner.clone();
            let config = self.config;
            let running = self.running.clone();
            tokio::spawn(async move {
                Self::run_admission_loop(inner, config).await;
                running.store(false, Ordering::Release);
            });
        }
    }

    /// The admission loop (§4.4): drains the queue subject to token-bucket
    /// and spacing constraints, handling retries and timeouts inline.
    async fn run_admission_loop(inner: Arc<Mutex<Inner<T>>>, config: RequestQueueConfig) {
        let spacing = config.min_request_spacing();
        loop {
            let next = {
                let mut guard = inner.lock().await;
                if guard.items.is_empty() {
                    return;
                }
                if !guard.bucket.try_acquire() {
                    None
                } else {
                    guard.items.pop_front()
                }
            };

            let Some(item) = next else {
                // No tokens available right now: wait roughly long enough
                // for the bucket to mint one, then recheck. Nothing else is
                // going to wake this loop since no new item was enqueued.
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            };

            // Enforce spacing since the last admitted request.
            {
                let last = inner.lock().await.last_request_at;
                if let Some(last) = last {
                    let elapsed = last.elapsed();
                    if elapsed < spacing {
                        tokio::time::sleep(spacing - elapsed).await;
                    }
                }
            }

            let started_at = Instant::now();
            let result = crate::timeout::with_timeout(
                config.request_timeout.as_millis() as u64,
                "queued request timed out",
                (item.execute)(),
            )
            .await;
            let elapsed = started_at.elapsed();

            {
                let mut guard = inner.lock().await;
                guard.last_request_at = Some(Instant::now());
            }

            match result {
                Ok(value) => {
                    if elapsed > Duration::from_secs(1) {
                        warn!(request_id = %item.id, elapsed_ms = elapsed.as_millis() as u64, "slow queued request");
                    } else {
                        debug!(request_id = %item.id, elapsed_ms = elapsed.as_millis() as u64, "queued request completed");
                    }
                    let _ = item.resolver.send(Ok(value));
                }
                Err(err) => {
                    let retryable = err.code.is_retryable();
                    if retryable && item.retry_count < config.max_retries {
                        let retry_count = item.retry_count + 1;
                        let delay = config.retry_delay * 2u32.pow(retry_count - 1);
                        warn!(
                            request_id = %item.id,
                            attempt = retry_count,
                            delay_ms = delay.as_millis() as u64,
                            code = %err.code,
                            "retrying queued request"
                        );
                        tokio::time::sleep(delay).await;
                        let mut guard = inner.lock().await;
                        guard.items.push_back(QueuedRequest {
                            retry_count,
                            queued_at: item.queued_at,
                            ..item
                        });
                    } else {
                        let _ = item.resolver.send(Err(err));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn config(max_retries: u32) -> RequestQueueConfig {
        RequestQueueConfig {
            max_requests_per_interval: 100,
            interval: Duration::from_millis(100),
            max_retries,
            retry_delay: Duration::from_millis(5),
            request_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn fifo_admission_order_with_no_retries() {
        let queue = RequestQueue::<u32>::new(config(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5u32 {
            let queue = queue.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                queue
                    .enqueue(move || {
                        let order = order.clone();
                        async move {
                            order.lock().await.push(i);
                            Ok::<_, ApiError>(i)
                        }
                    })
                    .await
            }));
            // Stagger enqueues slightly so push order is deterministic.
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn b2_zero_retries_rejects_on_first_failure() {
        let queue = RequestQueue::<u32>::new(config(0));
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = queue
            .enqueue(move || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(ApiError::upstream("boom"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn p5_retries_exactly_max_retries_times_then_rejects() {
        let queue = RequestQueue::<u32>::new(config(3));
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = queue
            .enqueue(move || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(ApiError::upstream("always fails"))
                }
            })
            .await;

        assert!(result.is_err());
        // One initial attempt plus max_retries retries.
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn non_retryable_errors_do_not_consume_retry_budget() {
        let queue = RequestQueue::<u32>::new(config(3));
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = queue
            .enqueue(move || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(ApiError::validation("bad input"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retried_request_resolves_on_eventual_success() {
        let queue = RequestQueue::<u32>::new(config(3));
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = queue
            .enqueue(move || {
                let attempts = attempts_clone.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(ApiError::upstream("transient"))
                    } else {
                        Ok(99u32)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 99);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    // P2: for any N enqueues with no retries, admission order = enqueue order.
    proptest::proptest! {
        #[test]
        fn p2_fifo_admission_order_for_any_n(n in 1u32..20) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let queue = RequestQueue::<u32>::new(config(0));
                let order = Arc::new(Mutex::new(Vec::new()));

                let mut handles = Vec::new();
                for i in 0..n {
                    let queue = queue.clone();
                    let order = order.clone();
                    handles.push(tokio::spawn(async move {
                        queue
                            .enqueue(move || {
                                let order = order.clone();
                                async move {
                                    order.lock().await.push(i);
                                    Ok::<_, ApiError>(i)
                                }
                            })
                            .await
                    }));
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                for h in handles {
                    h.await.unwrap().unwrap();
                }

                let expected: Vec<u32> = (0..n).collect();
                proptest::prop_assert_eq!(*order.lock().await, expected);
                Ok(())
            })?;
        }
    }

    // P5: for any max_retries, an always-failing retryable closure is retried
    // exactly max_retries times before rejecting.
    proptest::proptest! {
        #[test]
        fn p5_retries_exactly_max_retries_times_for_any_config(max_retries in 0u32..6) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let queue = RequestQueue::<u32>::new(config(max_retries));
                let attempts = Arc::new(AtomicU32::new(0));
                let attempts_clone = attempts.clone();

                let result = queue
                    .enqueue(move || {
                        let attempts = attempts_clone.clone();
                        async move {
                            attempts.fetch_add(1, Ordering::SeqCst);
                            Err::<u32, _>(ApiError::upstream("always fails"))
                        }
                    })
                    .await;

                proptest::prop_assert!(result.is_err());
                proptest::prop_assert_eq!(attempts.load(Ordering::SeqCst), max_retries + 1);
                Ok(())
            })?;
        }
    }
}
