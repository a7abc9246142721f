use crate::error::Result;
use std::future::Future;
use tracing::debug;

/// Runs `op` until it succeeds, fails permanently, or `attempts` runs out.
///
/// Only transient failures (lost compare-and-swap races, storage hiccups)
/// are retried. Each attempt must reload whatever state it depends on.
pub async fn retry_transient<T, F, Fut>(attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_transient() && attempt < attempts => {
                debug!(attempt, error = %err, "retrying after transient failure");
                attempt += 1;
                tokio::task::yield_now().await;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VendingError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_conflicts_up_to_limit() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = retry_transient(3, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(VendingError::conflict("order", "1"))
        })
        .await;

        assert!(matches!(result, Err(VendingError::Conflict { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_business_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = retry_transient(3, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(VendingError::ValidationError("bad".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_conflict() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_transient(3, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(VendingError::conflict("order", "1"))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
    }
}
