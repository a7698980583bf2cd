//! Retry logic with exponential backoff
//!
//! Only transport-level failures (connect errors, request timeouts, reset
//! connections) are retried. A platform answer of any status is final: the
//! login choreography is stateful and replaying a request the server already
//! processed can rotate cookies under us. For the same reason a non-idempotent
//! request (`POST`, `PATCH`) is only replayed when it never reached the
//! server; see [`Error::is_retryable_for`].
//!
//! # Example
//!
//! ```no_run
//! use zhihu_publish::retry::{IsRetryable, with_retry};
//! use zhihu_publish::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! with_retry(&config, || async {
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use reqwest::Method;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // The platform answered; replaying is not safe
            Error::Remote { .. } | Error::Parse { .. } => false,
            // Budgets are already exhausted by the time these surface
            Error::Timeout { .. } => false,
            Error::Config { .. }
            | Error::Precondition(_)
            | Error::InvalidLink(_)
            | Error::UnsupportedImageType(_)
            | Error::ImageNotFound(_)
            | Error::MissingCookie(_)
            | Error::LoginInProgress
            | Error::Serialization(_)
            | Error::Yaml(_)
            | Error::Other(_) => false,
        }
    }
}

impl Error {
    /// Returns true for transient transport failures
    pub fn is_retryable(&self) -> bool {
        IsRetryable::is_retryable(self)
    }

    /// Returns true if a request sent with `method` may be replayed after this error
    ///
    /// Idempotent methods retry every transient failure. Other methods retry
    /// only when the connection was never established, since a timed-out or
    /// reset request may already have been processed.
    pub fn is_retryable_for(&self, method: &Method) -> bool {
        if is_idempotent(method) {
            return self.is_retryable();
        }
        match self {
            Error::Network(e) => e.is_connect(),
            Error::Io(e) => e.kind() == std::io::ErrorKind::ConnectionRefused,
            _ => false,
        }
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS
    )
}

/// Execute an async operation with exponential backoff retry logic
///
/// Returns the successful result or the last error once the error is not
/// retryable or `config.max_attempts` retries have been spent.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    with_retry_if(config, |e: &E| e.is_retryable(), operation).await
}

/// Like [`with_retry`], with the retry decision made by `should_retry`
pub async fn with_retry_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "request succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if should_retry(&e) && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "request failed, retrying"
                );

                let wait = if config.jitter { add_jitter(delay) } else { delay };
                tokio::time::sleep(wait).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if should_retry(&e) {
                    tracing::debug!(
                        error = %e,
                        attempts = attempt + 1,
                        "retry attempts exhausted"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Add uniform jitter so the actual delay lands between `delay` and `2 * delay`
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
