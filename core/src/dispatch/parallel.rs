// Batch Execution
// Runs every invocation of one completion, sequentially or concurrently

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};
use weave_config::{DispatchConfig, DispatchMode};
use weave_protocol::{CapabilityRequest, CapabilityResult, FailureKind};

use crate::dispatch::router::CapabilityRouter;

/// Results of one invocation, tagged with its position in the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationOutcome {
  pub index: usize,
  pub request: CapabilityRequest,
  /// Never empty.
  pub results: Vec<CapabilityResult>,
}

pub struct BatchDispatcher {
  router: Arc<CapabilityRouter>,
  mode: DispatchMode,
  max_concurrency: usize,
}

impl BatchDispatcher {
  pub fn new(router: Arc<CapabilityRouter>, mode: DispatchMode, max_concurrency: usize) -> Self {
    Self {
      router,
      mode,
      max_concurrency: max_concurrency.max(1),
    }
  }

  pub fn from_config(router: Arc<CapabilityRouter>, config: &DispatchConfig) -> Self {
    Self::new(router, config.mode, config.max_concurrency)
  }

  /// Dispatch every request and return one outcome per request, in input
  /// order regardless of completion order. A request whose task panics or
  /// is cancelled still gets a `Failure` outcome and does not affect the
  /// others.
  pub async fn dispatch_all(&self, requests: Vec<CapabilityRequest>) -> Vec<InvocationOutcome> {
    let results = match self.mode {
      DispatchMode::Sequential => self.run_sequential(&requests).await,
      DispatchMode::Concurrent => self.run_concurrent(&requests).await,
    };

    requests
      .into_iter()
      .zip(results)
      .enumerate()
      .map(|(index, (request, slot))| {
        let results = slot.unwrap_or_else(|| {
          vec![CapabilityResult::failure(
            FailureKind::Provider,
            "Tool call was aborted before it finished",
          )]
        });
        InvocationOutcome {
          index,
          request,
          results,
        }
      })
      .collect()
  }

  async fn run_sequential(
    &self,
    requests: &[CapabilityRequest],
  ) -> Vec<Option<Vec<CapabilityResult>>> {
    let mut slots = Vec::with_capacity(requests.len());
    for request in requests {
      let router = self.router.clone();
      let request = request.clone();
      let command = request.command.clone();
      // Each call runs in its own task so a panicking provider is contained.
      let handle = tokio::spawn(async move { router.dispatch(&request).await });
      match handle.await {
        Ok(results) => slots.push(Some(results)),
        Err(err) => {
          error!(command = %command, error = %err, "Tool call task failed");
          slots.push(None);
        }
      }
    }
    slots
  }

  async fn run_concurrent(
    &self,
    requests: &[CapabilityRequest],
  ) -> Vec<Option<Vec<CapabilityResult>>> {
    let mut slots: Vec<Option<Vec<CapabilityResult>>> = vec![None; requests.len()];
    let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
    let mut workers = JoinSet::new();
    let mut task_index = HashMap::new();

    for (index, request) in requests.iter().enumerate() {
      let router = self.router.clone();
      let request = request.clone();
      let semaphore = semaphore.clone();
      let handle = workers.spawn(async move {
        let _permit = semaphore.acquire_owned().await.ok();
        (index, router.dispatch(&request).await)
      });
      task_index.insert(handle.id(), index);
    }

    while let Some(joined) = workers.join_next_with_id().await {
      match joined {
        Ok((_, (index, results))) => slots[index] = Some(results),
        Err(err) => {
          let index = task_index.get(&err.id()).copied();
          warn!(?index, error = %err, "Tool call task failed");
        }
      }
    }
    slots
  }
}
