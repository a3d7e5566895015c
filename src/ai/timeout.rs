//! Deadline for router calls.

use std::future::Future;
use std::time::Duration;

use crate::types::{FlowError, Result};

/// Await `future`, failing with `FlowError::Timeout` once `limit` elapses.
///
/// The AI router is optional, so callers usually wrap this in `log_filter_warn`
/// and fall back to template content.
pub async fn with_timeout<T, F>(limit: Duration, future: F, operation: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, future)
        .await
        .unwrap_or_else(|_| Err(FlowError::timeout(operation, limit)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_limit() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, FlowError>("draft") },
            "follow-up draft",
        )
        .await;
        assert_eq!(result.unwrap(), "draft");
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<()> = with_timeout(
            Duration::from_secs(1),
            async { Err(FlowError::Ai("rate limited".into())) },
            "follow-up draft",
        )
        .await;
        assert_eq!(result.unwrap_err().code(), "AI_ERROR");
    }

    #[tokio::test]
    async fn test_slow_router_times_out() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, FlowError>(())
            },
            "slow draft",
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, FlowError::Timeout { .. }));
        assert_eq!(err.code(), "TIMEOUT");
    }
}
