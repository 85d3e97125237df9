use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;

use super::ProviderError;

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Retries `f` up to `MAX_ATTEMPTS` times on `ProviderError::Transient`, with
/// exponential backoff starting at ~2s and capped at ~10s, jittered so
/// concurrent retries don't thunder. Respects `deadline`: if the remaining
/// time can't cover the next backoff, no further attempt is made and the
/// last transient error is surfaced as `ProviderError::Unavailable`.
/// `ProviderError::Permanent` is never retried.
pub async fn with_retry<T, F, Fut>(deadline: Instant, mut f: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(ProviderError::Permanent(msg)) => return Err(ProviderError::Permanent(msg)),
            Err(ProviderError::Unavailable(msg)) => return Err(ProviderError::Unavailable(msg)),
            Err(ProviderError::Transient(msg)) => {
                if attempt >= MAX_ATTEMPTS {
                    return Err(ProviderError::Unavailable(format!(
                        "exhausted {MAX_ATTEMPTS} attempts: {msg}"
                    )));
                }

                let backoff = backoff_for_attempt(attempt);
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining < backoff {
                    return Err(ProviderError::Unavailable(format!(
                        "insufficient time remaining for retry: {msg}"
                    )));
                }

                tokio::time::sleep(backoff).await;
            }
        }
    }
}

fn backoff_for_attempt(attempt: u32) -> Duration {
    let exp = BASE_BACKOFF.saturating_mul(1 << (attempt - 1).min(8));
    let capped = exp.min(MAX_BACKOFF);

    let jitter_ms = rand::rng().random_range(0..=capped.as_millis() as u64 / 3);
    capped + Duration::from_millis(jitter_ms)
}
