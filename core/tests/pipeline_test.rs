use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use weave_config::{Config, DispatchMode};
use weave_core::delivery::{Deliverable, DeliveryError, MemoryTransport};
use weave_core::dispatch::{CapabilityProvider, CapabilityRegistry, ProviderError, ProviderOutput};
use weave_core::{ConversationState, Pipeline, PipelineError};
use weave_protocol::{CapabilityResult, FailureKind, MediaPayload, OutputUnit, SpeechMode};

type Reply = Box<dyn Fn(&str) -> Result<ProviderOutput, ProviderError> + Send + Sync>;

struct StubProvider {
  command: &'static str,
  reply: Reply,
  calls: AtomicUsize,
}

impl StubProvider {
  fn new(
    command: &'static str,
    reply: impl Fn(&str) -> Result<ProviderOutput, ProviderError> + Send + Sync + 'static,
  ) -> Arc<Self> {
    Arc::new(Self {
      command,
      reply: Box::new(reply),
      calls: AtomicUsize::new(0),
    })
  }

  fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl CapabilityProvider for StubProvider {
  fn command(&self) -> &str {
    self.command
  }

  async fn invoke(&self, argument: &str) -> Result<ProviderOutput, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    (self.reply)(argument)
  }
}

fn pipeline_with(config: &Config, providers: Vec<Arc<StubProvider>>) -> Pipeline {
  let mut registry = CapabilityRegistry::new();
  for provider in providers {
    registry.register(provider);
  }
  Pipeline::new(config, registry)
}

fn web_stub() -> Arc<StubProvider> {
  StubProvider::new("/web", |query| {
    Ok(ProviderOutput::Text(if query == "weather today" {
      "sunny".to_string()
    } else {
      format!("results for {query}")
    }))
  })
}

fn speak_stub() -> Arc<StubProvider> {
  StubProvider::new("/speak", |text| {
    Ok(ProviderOutput::Media(
      MediaPayload::new("audio/wav", text.as_bytes().to_vec()).with_file_name("speech.wav"),
    ))
  })
}

#[tokio::test]
async fn narration_result_narration_in_order() {
  let web = web_stub();
  let pipeline = pipeline_with(&Config::default(), vec![web.clone()]);
  let transport = MemoryTransport::new();

  let report = pipeline
    .run(
      "Sure!\nTool call: /web \"weather today\"\nEnjoy.",
      &ConversationState::new("test"),
      &transport,
    )
    .await
    .expect("pipeline run");

  assert_eq!(
    transport.units().await,
    vec![
      OutputUnit::narration("Sure!"),
      OutputUnit::result("/web", CapabilityResult::text("sunny")),
      OutputUnit::narration("Enjoy."),
    ]
  );
  assert_eq!(report.segments, 3);
  assert_eq!(report.invocations, 1);
  assert_eq!(report.units_delivered, 3);
  assert!(!report.used_fallback);
  assert_eq!(transport.typing_signals().await, 1);
  assert_eq!(web.calls(), 1);
}

#[tokio::test]
async fn failing_invocation_does_not_hide_its_sibling() {
  for mode in [DispatchMode::Sequential, DispatchMode::Concurrent] {
    let mut config = Config::default();
    config.dispatch.mode = mode;
    let broken = StubProvider::new("/img", |_| {
      Err(ProviderError::Status {
        status: 500,
        body: "gpu on fire".to_string(),
      })
    });
    let pipeline = pipeline_with(&config, vec![broken, web_stub()]);
    let transport = MemoryTransport::new();

    pipeline
      .run(
        "Tool call: /img a cat\nTool call: /web rust",
        &ConversationState::default(),
        &transport,
      )
      .await
      .expect("pipeline run");

    let units = transport.units().await;
    assert_eq!(units.len(), 2, "mode {mode:?}");
    assert!(matches!(
      &units[0],
      OutputUnit::Result {
        command,
        result: CapabilityResult::Failure {
          kind: FailureKind::Provider,
          ..
        },
      } if command == "/img"
    ));
    assert_eq!(
      units[1],
      OutputUnit::result("/web", CapabilityResult::text("results for rust"))
    );
  }
}

#[tokio::test]
async fn headers_inside_reasoning_are_not_dispatched() {
  let image = StubProvider::new("/img", |_| Ok(ProviderOutput::Text("drawn".to_string())));
  let pipeline = pipeline_with(&Config::default(), vec![image.clone()]);
  let transport = MemoryTransport::new();

  let report = pipeline
    .run(
      "<think>Tool call: /img x</think>ok",
      &ConversationState::default(),
      &transport,
    )
    .await
    .expect("pipeline run");

  assert_eq!(transport.units().await, vec![OutputUnit::narration("ok")]);
  assert_eq!(report.invocations, 0);
  assert_eq!(image.calls(), 0);
  assert_eq!(transport.typing_signals().await, 0);
}

#[tokio::test]
async fn unknown_command_is_reported_not_dropped() {
  let pipeline = pipeline_with(&Config::default(), vec![web_stub()]);
  let transport = MemoryTransport::new();

  pipeline
    .run(
      "Tool call: /paint a sunset\nTool call: /web x",
      &ConversationState::default(),
      &transport,
    )
    .await
    .expect("pipeline run");

  let units = transport.units().await;
  assert_eq!(
    units[0],
    OutputUnit::result(
      "/paint",
      CapabilityResult::failure(FailureKind::UnknownCommand, "Unknown tool `/paint`")
    )
  );
  assert_eq!(units.len(), 2);
}

#[tokio::test]
async fn empty_output_gets_the_fallback_unit() {
  let config = Config::default();
  let pipeline = pipeline_with(&config, vec![]);

  for raw in ["", "   \n", "<think>only reasoning, never closed"] {
    let transport = MemoryTransport::new();
    let report = pipeline
      .run(raw, &ConversationState::default(), &transport)
      .await
      .expect("pipeline run");
    assert!(report.used_fallback, "input {raw:?}");
    assert_eq!(
      transport.units().await,
      vec![OutputUnit::narration(config.pipeline.fallback_message.clone())]
    );
  }
}

#[tokio::test]
async fn disabled_tools_leave_text_untouched() {
  let mut config = Config::default();
  config.pipeline.tools_enabled = false;
  let web = web_stub();
  let pipeline = pipeline_with(&config, vec![web.clone()]);
  let transport = MemoryTransport::new();

  pipeline
    .run("Tool call: /web rust", &ConversationState::default(), &transport)
    .await
    .expect("pipeline run");

  assert_eq!(
    transport.units().await,
    vec![OutputUnit::narration("Tool call: /web rust")]
  );
  assert_eq!(web.calls(), 0);
}

#[tokio::test]
async fn reasoning_is_hidden_and_speaker_prefix_stripped() {
  let mut config = Config::default();
  config.pipeline.speaker_name = Some("Weave".to_string());
  let pipeline = pipeline_with(&config, vec![]);
  let transport = MemoryTransport::new();

  pipeline
    .run(
      "<think>what should I say?</think>\nWeave: Hello there!",
      &ConversationState::default(),
      &transport,
    )
    .await
    .expect("pipeline run");

  assert_eq!(
    transport.units().await,
    vec![OutputUnit::narration("Hello there!")]
  );
}

#[tokio::test]
async fn echo_precedes_each_result() {
  let mut config = Config::default();
  config.pipeline.echo_invocations = true;
  let pipeline = pipeline_with(&config, vec![web_stub()]);
  let transport = MemoryTransport::new();

  pipeline
    .run(
      "Tool call: /web \"weather today\"",
      &ConversationState::default(),
      &transport,
    )
    .await
    .expect("pipeline run");

  assert_eq!(
    transport.units().await,
    vec![
      OutputUnit::narration("`Tool call: /web`\n```\n\"weather today\"\n```"),
      OutputUnit::result("/web", CapabilityResult::text("sunny")),
    ]
  );
}

#[tokio::test]
async fn split_media_arrives_as_ordered_units() {
  let music = StubProvider::new("/music", |_| {
    Ok(ProviderOutput::MediaSequence(vec![
      MediaPayload::new("audio/mpeg", vec![1]).with_file_name("segment_1.mp3"),
      MediaPayload::new("audio/mpeg", vec![2]).with_file_name("segment_2.mp3"),
    ]))
  });
  let pipeline = pipeline_with(&Config::default(), vec![music]);
  let transport = MemoryTransport::new();

  pipeline
    .run(
      "Here you go\nTool call: /music lofi\n\nla la",
      &ConversationState::default(),
      &transport,
    )
    .await
    .expect("pipeline run");

  let names: Vec<_> = transport
    .units()
    .await
    .into_iter()
    .filter_map(|unit| match unit {
      OutputUnit::Result {
        result: CapabilityResult::Media(payload),
        ..
      } => payload.file_name,
      _ => None,
    })
    .collect();
  assert_eq!(names, vec!["segment_1.mp3", "segment_2.mp3"]);
}

#[tokio::test]
async fn speech_modes_shape_the_reply() {
  let pipeline = pipeline_with(&Config::default(), vec![speak_stub()]);
  let audio = OutputUnit::result(
    "/speak",
    CapabilityResult::Media(
      MediaPayload::new("audio/wav", b"Hi there".to_vec()).with_file_name("speech.wav"),
    ),
  );

  let transport = MemoryTransport::new();
  let state = ConversationState::new("guild").with_speech_mode(SpeechMode::On);
  pipeline
    .run("Hi there", &state, &transport)
    .await
    .expect("pipeline run");
  assert_eq!(
    transport.units().await,
    vec![OutputUnit::narration("Hi there"), audio.clone()]
  );

  let transport = MemoryTransport::new();
  let state = state.with_speech_mode(SpeechMode::AudioOnly);
  pipeline
    .run("Hi there", &state, &transport)
    .await
    .expect("pipeline run");
  assert_eq!(transport.units().await, vec![audio]);

  let transport = MemoryTransport::new();
  pipeline
    .run("Hi there", &ConversationState::new("quiet"), &transport)
    .await
    .expect("pipeline run");
  assert_eq!(transport.units().await, vec![OutputUnit::narration("Hi there")]);
}

#[tokio::test]
async fn speech_reads_only_delivered_narration() {
  let mut config = Config::default();
  config.delivery.suppress_narration_after_text_result = true;
  config.pipeline.echo_invocations = true;
  let pipeline = pipeline_with(&config, vec![web_stub(), speak_stub()]);
  let transport = MemoryTransport::new();
  let state = ConversationState::default().with_speech_mode(SpeechMode::On);

  pipeline
    .run(
      "Looking it up.\nTool call: /web rust\nIt will be sunny.",
      &state,
      &transport,
    )
    .await
    .expect("pipeline run");

  let units = transport.units().await;
  assert_eq!(units.len(), 4);
  assert_eq!(units[0], OutputUnit::narration("Looking it up."));
  assert_eq!(
    units[2],
    OutputUnit::result("/web", CapabilityResult::text("results for rust"))
  );
  assert_eq!(
    units[3],
    OutputUnit::result(
      "/speak",
      CapabilityResult::Media(
        MediaPayload::new("audio/wav", b"Looking it up.".to_vec()).with_file_name("speech.wav"),
      ),
    )
  );
}

#[tokio::test]
async fn audio_only_keeps_text_when_synthesis_fails() {
  let mute = StubProvider::new("/speak", |_| {
    Err(ProviderError::InvalidResponse("no voice".to_string()))
  });
  let pipeline = pipeline_with(&Config::default(), vec![mute]);
  let transport = MemoryTransport::new();
  let state = ConversationState::default().with_speech_mode(SpeechMode::AudioOnly);

  pipeline
    .run("Still here", &state, &transport)
    .await
    .expect("pipeline run");
  assert_eq!(transport.units().await, vec![OutputUnit::narration("Still here")]);
}

struct FlakyTransport {
  accepted: AtomicUsize,
  capacity: usize,
}

#[async_trait]
impl Deliverable for FlakyTransport {
  async fn deliver(&self, _unit: OutputUnit) -> Result<(), DeliveryError> {
    if self.accepted.load(Ordering::SeqCst) >= self.capacity {
      return Err(DeliveryError::Closed);
    }
    self.accepted.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

#[tokio::test]
async fn delivery_failure_reports_progress() {
  let pipeline = pipeline_with(&Config::default(), vec![web_stub()]);
  let transport = FlakyTransport {
    accepted: AtomicUsize::new(0),
    capacity: 1,
  };

  let err = pipeline
    .run(
      "Sure!\nTool call: /web x\nEnjoy.",
      &ConversationState::default(),
      &transport,
    )
    .await
    .expect_err("second unit should fail");
  assert!(matches!(
    err,
    PipelineError::Delivery {
      delivered: 1,
      source: DeliveryError::Closed
    }
  ));
}
