use std::future::Future;

use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::{Error, Result};

/// Run `operation` until it succeeds or `policy.attempts` is used up,
/// sleeping with exponential backoff in between.
///
/// Cancellation and caller input errors are returned as-is; anything else
/// that survives every attempt becomes [`Error::ExternalService`].
pub async fn retry_with_backoff<T, F, Fut>(
    service: &'static str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if matches!(err, Error::Cancelled) || err.is_input_error() => {
                return Err(err)
            }
            Err(err) if attempt >= attempts => {
                return Err(Error::ExternalService {
                    service,
                    attempts,
                    message: err.to_string(),
                });
            }
            Err(err) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    service,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "collaborator call failed; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
