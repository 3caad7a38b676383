//! Running one upstream call with a pooled key.
//!
//! The helpers take a key from the pool, run the call, time it and report
//! the outcome back, so callers cannot forget the reporting half. They do
//! not retry: trying the next key is left to the caller.

use crate::error::{AppError, Result};
use crate::pool::{KeyPool, UpstreamFailure};
use std::future::Future;
use std::time::Instant;
use tracing::debug;

/// Runs `operation` with the next available key of `pool`.
///
/// Exhaustion becomes [`AppError::NoAvailableKeys`] (503) without calling
/// the operation; an operation failure is reported to the pool and
/// returned as [`AppError::Upstream`] (502).
pub async fn call_with_key<F, Fut, T>(pool: &KeyPool, operation: F) -> Result<T>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = std::result::Result<T, UpstreamFailure>>,
{
    let Some(key) = pool.get_next_key() else {
        return Err(AppError::NoAvailableKeys {
            provider: pool.provider().to_string(),
        });
    };

    let started = Instant::now();
    let outcome = operation(key.clone()).await;
    let elapsed = started.elapsed();

    match outcome {
        Ok(value) => {
            pool.report_success(&key, elapsed);
            Ok(value)
        }
        Err(failure) => {
            debug!(provider = pool.provider(), status = ?failure.status, "Upstream call failed");
            pool.report_failure(&key, failure.clone(), Some(elapsed));
            Err(AppError::Upstream {
                provider: pool.provider().to_string(),
                status: failure.status,
                message: failure.message,
            })
        }
    }
}

/// [`call_with_key`] for reqwest: `build` turns the key into a request,
/// transport errors and non-2xx statuses count as failures.
pub async fn send_with_key<B>(pool: &KeyPool, build: B) -> Result<reqwest::Response>
where
    B: FnOnce(&str) -> reqwest::RequestBuilder,
{
    call_with_key(pool, |key| {
        let request = build(&key);
        async move {
            let response = request.send().await?;
            response.error_for_status().map_err(UpstreamFailure::from)
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;
    use axum::http::StatusCode;

    fn pool(keys: &[&str]) -> KeyPool {
        KeyPool::new(PoolConfig::for_provider(
            "exa",
            keys.iter().map(|k| k.to_string()).collect(),
        ))
    }

    #[tokio::test]
    async fn test_success_is_reported() {
        let pool = pool(&["exa-key-0001"]);
        let value = call_with_key(&pool, |key| async move { Ok::<_, UpstreamFailure>(key.len()) })
            .await
            .unwrap();
        assert_eq!(value, 12);

        let stats = pool.get_usage_stats();
        assert_eq!(stats.total_uses, 1);
        assert_eq!(stats.total_failures, 0);
    }

    #[tokio::test]
    async fn test_exhaustion_skips_operation() {
        let pool = pool(&[]);
        let result = call_with_key(&pool, |_| async { Ok::<_, UpstreamFailure>(()) }).await;
        let err = result.unwrap_err();
        assert!(matches!(err, AppError::NoAvailableKeys { .. }));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_classified() {
        let pool = pool(&["exa-key-0001"]);
        let result = call_with_key(&pool, |_| async {
            Err::<(), _>(UpstreamFailure::with_status(401, "401 Unauthorized"))
        })
        .await;

        match result {
            Err(AppError::Upstream { status, .. }) => assert_eq!(status, Some(401)),
            other => panic!("unexpected result: {other:?}"),
        }
        let stats = pool.get_usage_stats();
        assert_eq!(stats.circuit_broken_keys, 1);
        assert_eq!(stats.active_keys, 0);
    }
}
