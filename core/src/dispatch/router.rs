use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};
use uuid::Uuid;
use weave_protocol::{CapabilityRequest, CapabilityResult, FailureKind};

use crate::dispatch::context::{ProviderError, ProviderOutput};
use crate::dispatch::registry::{CapabilityProvider, CapabilityRegistry};
use crate::dispatch::retry::RetryPolicy;

/// How a request's command relates to the registry.
pub enum Resolution {
  Known(Arc<dyn CapabilityProvider>),
  /// Well-formed command with no provider behind it.
  Unknown,
  /// The invocation carried no usable command.
  Malformed,
}

pub struct CapabilityRouter {
  registry: Arc<CapabilityRegistry>,
  retry: RetryPolicy,
}

impl CapabilityRouter {
  pub fn new(registry: Arc<CapabilityRegistry>, retry: RetryPolicy) -> Self {
    Self { registry, retry }
  }

  pub fn resolve(&self, command: &str) -> Resolution {
    if command.trim().trim_start_matches('/').is_empty() {
      return Resolution::Malformed;
    }
    match self.registry.get(command) {
      Some(provider) => Resolution::Known(provider.clone()),
      None => Resolution::Unknown,
    }
  }

  /// Run one request to completion.
  ///
  /// Always returns at least one result; every error, timeout and unknown
  /// command is folded into a `Failure`. Providers that split their output
  /// produce several `Media` results, in order.
  pub async fn dispatch(&self, request: &CapabilityRequest) -> Vec<CapabilityResult> {
    let provider = match self.resolve(&request.command) {
      Resolution::Known(provider) => provider,
      Resolution::Unknown => {
        warn!(command = %request.command, "Unknown tool");
        return vec![CapabilityResult::failure(
          FailureKind::UnknownCommand,
          format!("Unknown tool `{}`", request.command),
        )];
      }
      Resolution::Malformed => {
        return vec![CapabilityResult::failure(
          FailureKind::Malformed,
          "Could not read a command from the tool call",
        )];
      }
    };

    let id = Uuid::new_v4();
    let started = Instant::now();
    debug!(%id, command = %request.command, "Dispatching tool call");

    match self.call_with_retry(provider.as_ref(), &request.argument, id).await {
      Ok(output) => {
        debug!(
          %id,
          command = %request.command,
          elapsed_ms = started.elapsed().as_millis() as u64,
          "Tool call finished"
        );
        let results = output.into_results();
        if results.is_empty() {
          return vec![CapabilityResult::failure(
            FailureKind::Provider,
            "Provider returned no output",
          )];
        }
        results
      }
      Err(err) => {
        warn!(
          %id,
          command = %request.command,
          elapsed_ms = started.elapsed().as_millis() as u64,
          error = %err,
          "Tool call failed"
        );
        vec![err.into_result()]
      }
    }
  }

  async fn call_with_retry(
    &self,
    provider: &dyn CapabilityProvider,
    argument: &str,
    id: Uuid,
  ) -> Result<ProviderOutput, ProviderError> {
    let limit = provider.timeout();
    let mut attempt = 1;
    loop {
      let outcome = match tokio::time::timeout(limit, provider.invoke(argument)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ProviderError::Timeout(format!(
          "{} did not answer within {}s",
          provider.command(),
          limit.as_secs_f64()
        ))),
      };

      match outcome {
        Ok(output) => return Ok(output),
        Err(err) if self.retry.should_retry(attempt, &err) => {
          let delay = self.retry.backoff(attempt);
          warn!(
            %id,
            command = provider.command(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying tool call"
          );
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        Err(err) => return Err(err),
      }
    }
  }

  pub fn registry(&self) -> Arc<CapabilityRegistry> {
    self.registry.clone()
  }
}
