use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use super::ProviderError;

pub(crate) const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
pub(crate) const RETRY_MAX_DELAY: Duration = Duration::from_secs(8);

pub(crate) fn is_transient(err: &ProviderError) -> bool {
    match err {
        ProviderError::Timeout(_) => true,
        ProviderError::UnsupportedLocale { .. } => false,
        ProviderError::Failed(message) => {
            let lower = message.to_lowercase();
            lower.contains("try again")
                || lower.contains("temporarily")
                || lower.contains("busy")
                || lower.contains("resource unavailable")
        }
    }
}

pub(crate) async fn wait_with_backoff(
    provider: &str,
    attempt: usize,
    max_attempts: usize,
    delay: Duration,
) -> Duration {
    warn!(
        "{} failed transiently; retrying in {:.1}s (attempt {}/{})",
        provider,
        delay.as_secs_f32(),
        attempt,
        max_attempts
    );
    sleep(delay).await;
    next_delay(delay)
}

pub(crate) fn next_delay(current: Duration) -> Duration {
    let next_secs = current
        .as_secs()
        .saturating_mul(2)
        .max(RETRY_BASE_DELAY.as_secs());
    let next = Duration::from_secs(next_secs);
    if next > RETRY_MAX_DELAY {
        RETRY_MAX_DELAY
    } else {
        next
    }
}
