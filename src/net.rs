// Shared HTTP plumbing for the embedding and generation backends: bounded
// retry with exponential backoff, retrying only transient failures.

use std::time::Duration;
use tracing::{debug, error, warn};

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Classified outcome of a failed HTTP exchange, after retries.
#[derive(Debug)]
pub(crate) enum HttpFailure {
    /// The request exceeded its deadline.
    Timeout(String),
    /// The server answered with a non-success status.
    Status(u16, String),
    /// Connection-level failure (DNS, refused, reset).
    Transport(String),
}

impl std::fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout(msg) => write!(f, "timed out: {msg}"),
            Self::Status(code, msg) => write!(f, "HTTP {code}: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Run `request_fn` up to `attempts` times, backing off exponentially.
///
/// Server errors (5xx), timeouts, and transport failures are retried;
/// client errors (4xx) are returned immediately.
pub(crate) fn request_with_retry<F>(
    target: &str,
    attempts: u32,
    mut request_fn: F,
) -> Result<String, HttpFailure>
where
    F: FnMut() -> Result<String, ureq::Error>,
{
    let mut last_failure = None;

    for attempt in 1..=attempts {
        debug!("HTTP request to {} attempt {}/{}", target, attempt, attempts);

        match request_fn() {
            Ok(response_text) => {
                debug!("Request succeeded on attempt {}", attempt);
                return Ok(response_text);
            }
            Err(error) => {
                let failure = match &error {
                    ureq::Error::StatusCode(status) => {
                        if *status >= 500 {
                            warn!(
                                "Server error (status {}), attempt {}/{}",
                                status, attempt, attempts
                            );
                            HttpFailure::Status(*status, "server error".to_string())
                        } else {
                            warn!("Client error (status {}), not retrying", status);
                            return Err(HttpFailure::Status(*status, "client error".to_string()));
                        }
                    }
                    ureq::Error::Timeout(_) => {
                        warn!("Request timed out, attempt {}/{}", attempt, attempts);
                        HttpFailure::Timeout(error.to_string())
                    }
                    ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Io(_) => {
                        warn!(
                            "Transport error: {}, attempt {}/{}",
                            error, attempt, attempts
                        );
                        HttpFailure::Transport(error.to_string())
                    }
                    _ => {
                        warn!("Non-retryable error: {}", error);
                        return Err(HttpFailure::Transport(error.to_string()));
                    }
                };

                last_failure = Some(failure);

                if attempt < attempts {
                    let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                    let delay = Duration::from_millis(delay_ms);
                    debug!("Waiting {:?} before retry", delay);
                    std::thread::sleep(delay);
                }
            }
        }
    }

    error!("All retry attempts failed for request to {}", target);

    Err(last_failure
        .unwrap_or_else(|| HttpFailure::Transport("request failed after retries".to_string())))
}
