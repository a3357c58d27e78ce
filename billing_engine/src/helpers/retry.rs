use std::{fmt::Display, future::Future, time::Duration};

use log::*;

/// Bounded exponential backoff for local persistence calls.
///
/// The operation is attempted at most `attempts` times. The wait before retry `n` (1-based) is `base_delay * 2^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, base_delay: Duration::from_millis(50) }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }

    /// Runs `f` until it succeeds or the attempts are used up, returning the last error.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut f: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    warn!("🔁️ {label} failed (attempt {attempt}/{attempts}): {e}. Retrying in {}ms", delay.as_millis());
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(e) => {
                    error!("🔁️ {label} failed after {attempts} attempts: {e}");
                    return Err(e);
                },
            }
        }
    }
}
