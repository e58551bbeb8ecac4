// Retry policy
// One backoff schedule applied by the router to every provider call

use std::time::Duration;

use weave_config::RetryConfig;

use crate::dispatch::context::ProviderError;

/// Decides whether and when a failed provider call is attempted again.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
  max_attempts: u32,
  initial_backoff: Duration,
  max_backoff: Duration,
  multiplier: f64,
  retryable: fn(&ProviderError) -> bool,
}

impl RetryPolicy {
  /// A single attempt, no retries.
  pub fn none() -> Self {
    Self::from_config(&RetryConfig::default()).with_max_attempts(1)
  }

  pub fn from_config(config: &RetryConfig) -> Self {
    Self {
      max_attempts: config.max_attempts.max(1),
      initial_backoff: Duration::from_millis(config.initial_backoff_ms),
      max_backoff: Duration::from_millis(config.max_backoff_ms),
      multiplier: config.multiplier,
      retryable: ProviderError::is_retryable,
    }
  }

  pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
    self.max_attempts = max_attempts.max(1);
    self
  }

  pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
    self.initial_backoff = initial;
    self.max_backoff = max;
    self
  }

  /// Replace the retryable-error predicate.
  pub fn with_predicate(mut self, retryable: fn(&ProviderError) -> bool) -> Self {
    self.retryable = retryable;
    self
  }

  pub fn max_attempts(&self) -> u32 {
    self.max_attempts
  }

  /// Whether attempt number `attempt` (1-based) failing with `error`
  /// should be followed by another.
  pub fn should_retry(&self, attempt: u32, error: &ProviderError) -> bool {
    attempt < self.max_attempts && (self.retryable)(error)
  }

  /// Delay after failed attempt number `attempt` (1-based).
  pub fn backoff(&self, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(32) as i32;
    let factor = self.multiplier.powi(exponent);
    let millis = self.initial_backoff.as_millis() as f64 * factor;
    let capped = millis.min(self.max_backoff.as_millis() as f64);
    Duration::from_millis(capped.max(0.0) as u64)
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::none()
  }
}
