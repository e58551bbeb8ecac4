use weave_protocol::SpeechMode;

/// Per-conversation settings the caller keeps between completions.
///
/// One value per conversation (channel, guild, DM, ...); the pipeline only
/// reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
  conversation_id: String,
  speech_mode: SpeechMode,
}

impl ConversationState {
  pub fn new(conversation_id: impl Into<String>) -> Self {
    Self {
      conversation_id: conversation_id.into(),
      speech_mode: SpeechMode::Off,
    }
  }

  pub fn with_speech_mode(mut self, mode: SpeechMode) -> Self {
    self.speech_mode = mode;
    self
  }

  pub fn conversation_id(&self) -> &str {
    &self.conversation_id
  }

  pub fn speech_mode(&self) -> SpeechMode {
    self.speech_mode
  }

  pub fn set_speech_mode(&mut self, mode: SpeechMode) {
    self.speech_mode = mode;
  }
}
