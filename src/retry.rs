//! Retry policy around generation calls.
//!
//! Transient failures (rate limits, timeouts, 5xx, dropped connections) are
//! retried with exponential backoff up to a fixed number of attempts. Fatal
//! failures return at once. The policy knows nothing about languages or
//! concepts, so it can be tested with a closure and zero delays.

use crate::client::GenerationError;
use crate::config::RetryConfig;
use backon::{BlockingRetryable, ExponentialBuilder};
use std::cell::Cell;
use std::time::Duration;
use thiserror::Error;

/// The last error of an operation that did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct RetryFailure {
    pub attempts: u32,
    pub error: GenerationError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }

    /// Retry immediately; for tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize);
        if self.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }

    /// Call `op` until it succeeds, fails fatally, or runs out of attempts.
    pub fn run<T>(
        &self,
        mut op: impl FnMut() -> Result<T, GenerationError>,
    ) -> Result<T, RetryFailure> {
        let attempts = Cell::new(0u32);
        let result = (|| {
            attempts.set(attempts.get() + 1);
            op()
        })
        .retry(self.backoff())
        .when(GenerationError::is_transient)
        .notify(|err, delay| {
            log::warn!(
                "attempt {} failed: {err}; retrying in {:.1}s",
                attempts.get(),
                delay.as_secs_f64()
            );
        })
        .call();

        result.map_err(|error| RetryFailure {
            attempts: attempts.get(),
            error,
        })
    }
}
