// Delivery Assembler
// Merges narration and results into size-bounded output units

use tracing::debug;
use weave_config::DeliveryConfig;
use weave_protocol::{CapabilityResult, OutputUnit};

/// One input to the assembler, in completion order.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyItem {
  Narration(String),
  /// Pretty-printed invocation; delivered like narration but never voiced.
  Echo(String),
  /// Every result produced by one invocation.
  Results {
    command: String,
    results: Vec<CapabilityResult>,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
  pub units: Vec<OutputUnit>,
  /// Narration that made it into `units`, in order, without echoes.
  pub narration: Vec<String>,
}

impl Assembly {
  /// Nothing was produced; the caller owes the user a fallback unit.
  pub fn needs_fallback(&self) -> bool {
    self.units.is_empty()
  }
}

#[derive(Debug, Clone)]
pub struct DeliveryAssembler {
  max_unit_size: usize,
  text_result_unit_size: usize,
  continuation_marker: String,
  suppress_narration_after_text_result: bool,
}

impl DeliveryAssembler {
  pub fn new(config: &DeliveryConfig) -> Self {
    Self {
      max_unit_size: config.max_unit_size.max(1),
      text_result_unit_size: config.text_result_unit_size.max(1),
      continuation_marker: config.continuation_marker.clone(),
      suppress_narration_after_text_result: config.suppress_narration_after_text_result,
    }
  }

  pub fn assemble(&self, items: Vec<AssemblyItem>) -> Assembly {
    let mut units = Vec::new();
    let mut narration = Vec::new();
    let mut seen_text_result = false;

    for item in items {
      match item {
        AssemblyItem::Narration(text) | AssemblyItem::Echo(text)
          if seen_text_result && self.suppress_narration_after_text_result =>
        {
          debug!(chars = text.len(), "Dropped narration after a text result");
        }
        AssemblyItem::Narration(text) => {
          let chunks = split_text(&text, self.max_unit_size);
          if !chunks.is_empty() {
            narration.push(text.trim().to_string());
          }
          units.extend(chunks.into_iter().map(OutputUnit::narration));
        }
        AssemblyItem::Echo(text) => {
          units.extend(
            split_text(&text, self.max_unit_size)
              .into_iter()
              .map(OutputUnit::narration),
          );
        }
        AssemblyItem::Results { command, results } => {
          for result in results {
            match result {
              CapabilityResult::Text { content } => {
                seen_text_result = true;
                units.extend(self.text_result_units(&command, &content));
              }
              other => units.push(OutputUnit::result(command.clone(), other)),
            }
          }
        }
      }
    }

    Assembly { units, narration }
  }

  fn text_result_units(&self, command: &str, content: &str) -> Vec<OutputUnit> {
    let marker_len = self.continuation_marker.chars().count();
    let piece_size = self.text_result_unit_size.saturating_sub(marker_len).max(1);

    let mut pieces = Vec::new();
    let mut rest = content.trim();
    while !rest.is_empty() {
      if rest.chars().count() <= self.text_result_unit_size {
        pieces.push(rest.to_string());
        break;
      }
      let (chunk, remaining) = take_chunk(rest, piece_size);
      pieces.push(format!("{chunk}{}", self.continuation_marker));
      rest = remaining;
    }

    pieces
      .into_iter()
      .map(|piece| OutputUnit::result(command, CapabilityResult::text(piece)))
      .collect()
  }
}

/// Split `text` into trimmed chunks of at most `max` characters.
///
/// Chunks break at the last whitespace before the limit; a run with no
/// whitespace is cut at the limit. Blank input yields no chunks.
pub fn split_text(text: &str, max: usize) -> Vec<String> {
  let max = max.max(1);
  let mut rest = text.trim();
  let mut chunks = Vec::new();
  while !rest.is_empty() {
    let (chunk, remaining) = take_chunk(rest, max);
    chunks.push(chunk.to_string());
    rest = remaining;
  }
  chunks
}

/// Take the first chunk of `rest` (already trimmed), returning it and the
/// trimmed remainder.
fn take_chunk(rest: &str, max: usize) -> (&str, &str) {
  let Some((limit, _)) = rest.char_indices().nth(max) else {
    return (rest, "");
  };

  let boundary = if rest[limit..].starts_with(char::is_whitespace) {
    Some(limit)
  } else {
    rest[..limit].rfind(char::is_whitespace)
  };

  match boundary {
    Some(at) if at > 0 => (rest[..at].trim_end(), rest[at..].trim_start()),
    _ => (&rest[..limit], rest[limit..].trim_start()),
  }
}
