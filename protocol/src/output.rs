// Output units handed to a transport

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityResult;

/// One bounded piece of the reassembled reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum OutputUnit {
  Narration {
    text: String,
  },
  Result {
    /// Command that produced the result, e.g. `/web`.
    command: String,
    result: CapabilityResult,
  },
}

impl OutputUnit {
  pub fn narration(text: impl Into<String>) -> Self {
    OutputUnit::Narration { text: text.into() }
  }

  pub fn result(command: impl Into<String>, result: CapabilityResult) -> Self {
    OutputUnit::Result {
      command: command.into(),
      result,
    }
  }

  /// Narration text or textual result content, if this unit carries text.
  pub fn text(&self) -> Option<&str> {
    match self {
      OutputUnit::Narration { text } => Some(text),
      OutputUnit::Result {
        result: CapabilityResult::Text { content },
        ..
      } => Some(content),
      OutputUnit::Result { .. } => None,
    }
  }

  pub fn is_narration(&self) -> bool {
    matches!(self, OutputUnit::Narration { .. })
  }
}
