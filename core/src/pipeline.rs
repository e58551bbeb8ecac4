// Pipeline
// Raw completion in, ordered output units out

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use weave_config::{Config, PipelineConfig};
use weave_protocol::{CapabilityRequest, CapabilityResult, FailureKind, OutputUnit, Segment, SpeechMode};

use crate::delivery::{AssemblyItem, Deliverable, DeliveryAssembler, DeliveryError};
use crate::dispatch::{
  BatchDispatcher, CapabilityRegistry, CapabilityRouter, ProviderError, RetryPolicy,
};
use crate::parse::{format_invocation, segment, strip_reasoning, strip_speaker_prefix};
use crate::providers::register_default_providers;
use crate::state::ConversationState;

const SPEAK_COMMAND: &str = "/speak";

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("delivery failed after {delivered} unit(s): {source}")]
  Delivery {
    delivered: usize,
    #[source]
    source: DeliveryError,
  },
}

/// Summary of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
  pub segments: usize,
  pub invocations: usize,
  pub units_delivered: usize,
  pub used_fallback: bool,
}

/// Units ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedReply {
  pub units: Vec<OutputUnit>,
  pub used_fallback: bool,
}

pub struct Pipeline {
  settings: PipelineConfig,
  router: Arc<CapabilityRouter>,
  dispatcher: BatchDispatcher,
  assembler: DeliveryAssembler,
}

impl Pipeline {
  /// Build a pipeline over an explicit set of providers.
  pub fn new(config: &Config, registry: CapabilityRegistry) -> Self {
    let router = Arc::new(CapabilityRouter::new(
      Arc::new(registry),
      RetryPolicy::from_config(&config.dispatch.retry),
    ));
    Self {
      settings: config.pipeline.clone(),
      dispatcher: BatchDispatcher::from_config(router.clone(), &config.dispatch),
      router,
      assembler: DeliveryAssembler::new(&config.delivery),
    }
  }

  /// Build a pipeline with the providers enabled in `config`.
  pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
    let mut registry = CapabilityRegistry::new();
    register_default_providers(&mut registry, &config.providers)?;
    Ok(Self::new(config, registry))
  }

  pub fn router(&self) -> Arc<CapabilityRouter> {
    self.router.clone()
  }

  /// Segment a completion; with tools disabled it is all narration.
  pub fn segment(&self, raw: &str) -> Vec<Segment> {
    if !self.settings.tools_enabled {
      return vec![Segment::narration(0..raw.len(), raw.trim())];
    }
    segment(raw)
  }

  /// Process one completion and deliver its units in order.
  pub async fn run(
    &self,
    raw: &str,
    state: &ConversationState,
    transport: &dyn Deliverable,
  ) -> Result<PipelineReport, PipelineError> {
    let segments = self.segment(raw);
    let invocations = segments.iter().filter(|s| s.is_invocation()).count();
    debug!(
      conversation = state.conversation_id(),
      segments = segments.len(),
      invocations,
      "Segmented completion"
    );

    if invocations > 0 {
      transport.typing().await;
    }

    let rendered = self.render(&segments, state).await;
    let mut delivered = 0;
    for unit in rendered.units {
      transport
        .deliver(unit)
        .await
        .map_err(|source| PipelineError::Delivery { delivered, source })?;
      delivered += 1;
    }

    info!(
      conversation = state.conversation_id(),
      invocations,
      units = delivered,
      fallback = rendered.used_fallback,
      "Delivered reply"
    );
    Ok(PipelineReport {
      segments: segments.len(),
      invocations,
      units_delivered: delivered,
      used_fallback: rendered.used_fallback,
    })
  }

  /// Dispatch the invocations in `segments` and assemble every output unit.
  pub async fn render(&self, segments: &[Segment], state: &ConversationState) -> RenderedReply {
    let requests: Vec<CapabilityRequest> = segments
      .iter()
      .filter_map(Segment::as_invocation)
      .map(|invocation| CapabilityRequest::new(&invocation.command, &invocation.argument))
      .collect();
    let mut outcomes = self.dispatcher.dispatch_all(requests).await.into_iter();

    let mut items = Vec::with_capacity(segments.len());
    let mut awaiting_first_narration = true;

    for segment in segments {
      match segment {
        Segment::Narration { text, .. } => {
          let mut text = if self.settings.hide_reasoning {
            strip_reasoning(text)
          } else {
            text.clone()
          };
          if awaiting_first_narration && !text.is_empty() {
            awaiting_first_narration = false;
            if let Some(speaker) = self.settings.speaker_name.as_deref() {
              text = strip_speaker_prefix(&text, speaker).to_string();
            }
          }
          items.push(AssemblyItem::Narration(text));
        }
        Segment::Invocation(invocation) => {
          if self.settings.echo_invocations {
            items.push(AssemblyItem::Echo(format_invocation(
              &invocation.raw_slice,
            )));
          }
          let results = outcomes.next().map_or_else(
            || {
              vec![CapabilityResult::failure(
                FailureKind::Provider,
                "Tool call was not dispatched",
              )]
            },
            |outcome| outcome.results,
          );
          let command = if invocation.command.is_empty() {
            invocation.raw_slice.clone()
          } else {
            invocation.command.clone()
          };
          items.push(AssemblyItem::Results { command, results });
        }
      }
    }

    let assembly = self.assembler.assemble(items);
    let mut units = assembly.units;
    let mode = state.speech_mode();
    if mode.speaks() {
      units = self.voice(units, &assembly.narration.join("\n\n"), mode).await;
    }

    let used_fallback = units.is_empty();
    if used_fallback {
      warn!(
        conversation = state.conversation_id(),
        "Completion produced no output, sending fallback"
      );
      units.push(OutputUnit::narration(self.settings.fallback_message.clone()));
    }

    RenderedReply {
      units,
      used_fallback,
    }
  }

  /// Add a spoken rendition of the narration. In audio-only mode it replaces
  /// the narration units; if synthesis fails the text is kept.
  async fn voice(&self, mut units: Vec<OutputUnit>, text: &str, mode: SpeechMode) -> Vec<OutputUnit> {
    if text.trim().is_empty() || !self.router.registry().contains(SPEAK_COMMAND) {
      return units;
    }

    let results = self
      .router
      .dispatch(&CapabilityRequest::new(SPEAK_COMMAND, text))
      .await;
    let audio: Vec<OutputUnit> = results
      .into_iter()
      .filter_map(|result| match result {
        CapabilityResult::Media(payload) => Some(OutputUnit::result(
          SPEAK_COMMAND,
          CapabilityResult::Media(payload),
        )),
        CapabilityResult::Failure { reason, .. } => {
          warn!(%reason, "Speech synthesis failed, keeping text");
          None
        }
        CapabilityResult::Text { .. } => None,
      })
      .collect();

    if audio.is_empty() {
      return units;
    }
    if mode == SpeechMode::AudioOnly {
      units.retain(|unit| !unit.is_narration());
    }
    units.extend(audio);
    units
  }
}
