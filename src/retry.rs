//! Bounded fixed-interval polling.
//!
//! Waiting operations (cluster provisioning, registration manifest issuance)
//! check a condition, sleep a fixed interval, and give up after a maximum number
//! of attempts. The attempt bound is the only cancellation mechanism.
//!
//! # Example
//!
//! ```ignore
//! use labctl::retry::{poll_bounded, PollConfig, PollOutcome};
//!
//! let outcome = poll_bounded(&PollConfig::new(5_000, 12), "cluster_state", |_attempt| async {
//!     let state = client.cluster_state(&id).await?;
//!     Ok::<_, ApiError>(state.filter(|s| s != "provisioning"))
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Interval and attempt bound for a polling loop
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between two consecutive checks, in milliseconds
    pub interval_ms: u64,
    /// Maximum number of checks before the wait is declared a timeout
    pub max_attempts: u32,
}

impl PollConfig {
    pub fn new(interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            interval_ms,
            max_attempts,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Result of a bounded poll that did not hit a hard error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The predicate produced a value on the given (1-based) attempt
    Ready { value: T, attempts: u32 },
    /// The predicate never produced a value within the bound
    TimedOut { attempts: u32 },
}

impl<T> PollOutcome<T> {
    /// Returns the ready value, if any
    pub fn ready(self) -> Option<T> {
        match self {
            PollOutcome::Ready { value, .. } => Some(value),
            PollOutcome::TimedOut { .. } => None,
        }
    }
}

/// Poll `check` until it yields `Some`, an error, or the attempt bound runs out.
///
/// `check` receives the 1-based attempt number. `Ok(None)` means "not yet";
/// an `Err` aborts the poll immediately and is returned as-is. The loop sleeps
/// `interval` between checks but not after the last one, so a timeout costs
/// `(max_attempts - 1) * interval` of waiting.
///
/// A bound of zero performs no check and times out at once.
pub async fn poll_bounded<F, Fut, T, E>(
    config: &PollConfig,
    operation_name: &str,
    mut check: F,
) -> Result<PollOutcome<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    for attempt in 1..=config.max_attempts {
        if let Some(value) = check(attempt).await? {
            debug!(
                operation = %operation_name,
                attempt = attempt,
                "Poll condition met"
            );
            return Ok(PollOutcome::Ready {
                value,
                attempts: attempt,
            });
        }

        debug!(
            operation = %operation_name,
            attempt = attempt,
            max_attempts = config.max_attempts,
            "Poll condition not met yet"
        );

        if attempt < config.max_attempts {
            tokio::time::sleep(config.interval()).await;
        }
    }

    warn!(
        operation = %operation_name,
        attempts = config.max_attempts,
        "Poll bound exceeded"
    );
    Ok(PollOutcome::TimedOut {
        attempts: config.max_attempts,
    })
}
