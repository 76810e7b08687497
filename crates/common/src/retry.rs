use crate::config::RetrySettings;
use crate::context::CancellationToken;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Transient error signals worth retrying. Anything else fails fast.
const TRANSIENT_SIGNALS: &[&str] = &[
    "timeout",
    "timed out",
    "connection reset",
    "unreachable",
    "throttl",
    "rate limit",
    "service unavailable",
    "too many requests",
];

/// Whether an error message matches one of the known transient signals.
pub fn is_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_SIGNALS.iter().any(|s| lower.contains(s))
}

/// Calculate the delay for the next retry attempt with exponential backoff
/// and ±25% jitter.
pub fn next_retry_delay(attempt: usize, base_ms: u64, max_ms: u64) -> Duration {
    let multiplier = 2_u64.saturating_pow(attempt as u32);
    let delay = base_ms.saturating_mul(multiplier).min(max_ms);
    let span = delay / 4;
    let jitter = if span > 0 {
        rand::random::<u64>() % (2 * span + 1)
    } else {
        0
    };
    Duration::from_millis(delay - span + jitter)
}

/// Execute an async operation with retries.
///
/// Retries fire only for transient failures and stop as soon as the
/// cancellation token trips. The final error is returned unchanged.
pub async fn retry_async<T, E, F, Fut>(
    operation_name: &str,
    settings: RetrySettings,
    cancel: &CancellationToken,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt >= settings.max_attempts as usize
                    || !is_transient(&e.to_string())
                    || cancel.is_cancelled()
                {
                    error!(
                        "Failed to execute '{}' after {} attempt(s): {}",
                        operation_name, attempt, e
                    );
                    return Err(e);
                }
                let delay =
                    next_retry_delay(attempt, settings.base_delay_ms, settings.max_delay_ms);
                warn!(
                    "Operation '{}' failed. Retrying in {:?} (Attempt {}/{}): {}",
                    operation_name, delay, attempt, settings.max_attempts, e
                );
                tokio::time::sleep(delay).await;
                if cancel.is_cancelled() {
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_settings() -> RetrySettings {
        RetrySettings {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 4,
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient("Connection reset by peer"));
        assert!(is_transient("request timed out"));
        assert!(is_transient("429 Too Many Requests"));
        assert!(is_transient("ThrottlingException from upstream"));
        assert!(!is_transient("table 'pods' not found"));
        assert!(!is_transient("access denied"));
    }

    #[test]
    fn test_delay_within_jitter_bounds() {
        for attempt in 1..5 {
            let delay = next_retry_delay(attempt, 1_000, 10_000);
            let nominal = (1_000u64 * 2u64.pow(attempt as u32)).min(10_000);
            let lo = nominal - nominal / 4;
            let hi = nominal + nominal / 4;
            assert!(delay >= Duration::from_millis(lo));
            assert!(delay <= Duration::from_millis(hi));
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();
        let result: Result<u32, String> =
            retry_async("flaky", fast_settings(), &cancel, || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("connection reset".to_string())
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_permanent_failure() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();
        let result: Result<u32, String> =
            retry_async("broken", fast_settings(), &cancel, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("table not found".to_string())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_retries() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<u32, String> =
            retry_async("cancelled", fast_settings(), &cancel, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("timeout".to_string())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
