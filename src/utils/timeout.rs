//! Deadlines for transport operations

use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::error::Elapsed;

/// Run `operation`, giving up after `timeout_secs`
///
/// An expired deadline surfaces as [`Elapsed`] with `what` attached as
/// context; the operation's own errors pass through untouched.
pub async fn with_timeout<F, T>(operation: F, timeout_secs: u64, what: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(Duration::from_secs(timeout_secs), operation)
        .await
        .with_context(|| format!("{what} exceeded {timeout_secs}s"))?
}

/// True when `err` was caused by an expired [`with_timeout`] deadline
pub fn is_timeout_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<Elapsed>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_is_typed() {
        let result: Result<()> = with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            1,
            "Page load",
        )
        .await;

        let err = result.unwrap_err();
        assert!(is_timeout_error(&err));
        assert_eq!(err.to_string(), "Page load exceeded 1s");
    }

    #[tokio::test]
    async fn test_operation_error_mentioning_timeout_is_not_a_timeout() {
        let result: Result<()> = with_timeout(
            async { Err(anyhow::anyhow!("upstream timeout after 3 seconds")) },
            1,
            "Request",
        )
        .await;

        let err = result.unwrap_err();
        assert!(!is_timeout_error(&err));
        assert!(err.to_string().contains("upstream"));
    }

    #[tokio::test]
    async fn test_value_passes_through() {
        let value = with_timeout(async { Ok(7) }, 1, "Read").await.unwrap();
        assert_eq!(value, 7);
    }
}
