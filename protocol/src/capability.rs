// Capability requests and results

use serde::{Deserialize, Serialize};

/// A request routed to a capability provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRequest {
  pub command: String,
  pub argument: String,
}

impl CapabilityRequest {
  pub fn new(command: impl Into<String>, argument: impl Into<String>) -> Self {
    Self {
      command: command.into(),
      argument: argument.into(),
    }
  }
}

/// Binary output of a provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPayload {
  pub mime_type: String,
  /// Suggested attachment name, if the provider has one.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub file_name: Option<String>,
  #[serde(with = "crate::base64_bytes")]
  pub bytes: Vec<u8>,
}

impl MediaPayload {
  pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
    Self {
      mime_type: mime_type.into(),
      file_name: None,
      bytes,
    }
  }

  pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
    self.file_name = Some(file_name.into());
    self
  }

  /// Extension implied by the MIME type, used when naming files.
  pub fn extension(&self) -> &str {
    match self.mime_type.as_str() {
      "image/png" => "png",
      "image/jpeg" => "jpg",
      "image/webp" => "webp",
      "audio/mpeg" => "mp3",
      "audio/wav" | "audio/x-wav" => "wav",
      "audio/flac" => "flac",
      "text/plain" => "txt",
      _ => "bin",
    }
  }
}

impl std::fmt::Debug for MediaPayload {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MediaPayload")
      .field("mime_type", &self.mime_type)
      .field("file_name", &self.file_name)
      .field("len", &self.bytes.len())
      .finish()
  }
}

/// Why an invocation produced no usable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  /// The command is not registered.
  UnknownCommand,
  /// The invocation slice could not be split into command and argument.
  Malformed,
  /// The provider returned an error.
  Provider,
  /// The provider did not answer within its time limit.
  Timeout,
}

/// Outcome of one provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CapabilityResult {
  Text { content: String },
  Media(MediaPayload),
  Failure { kind: FailureKind, reason: String },
}

impl CapabilityResult {
  pub fn text(content: impl Into<String>) -> Self {
    CapabilityResult::Text {
      content: content.into(),
    }
  }

  pub fn failure(kind: FailureKind, reason: impl Into<String>) -> Self {
    CapabilityResult::Failure {
      kind,
      reason: reason.into(),
    }
  }

  pub fn is_failure(&self) -> bool {
    matches!(self, CapabilityResult::Failure { .. })
  }
}
