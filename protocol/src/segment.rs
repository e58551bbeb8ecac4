// Segments
// Ordered decomposition of one raw completion

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// One piece of a raw completion.
///
/// `span` is the half-open byte range the segment covers in the original
/// text. Spans of consecutive segments are contiguous, so joining
/// `source[span]` for every segment rebuilds the completion exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
  /// Free text. `text` is the trimmed content of `span`.
  Narration { span: Range<usize>, text: String },
  /// An embedded tool invocation.
  Invocation(Invocation),
}

/// An invocation found in the completion, already split into command and argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
  pub span: Range<usize>,
  /// Literal (trimmed) slice of the completion, kept for echo and logging.
  pub raw_slice: String,
  /// Lowercased command token including the leading slash, e.g. `/img`.
  /// Empty when the slice could not be canonicalized.
  pub command: String,
  pub argument: String,
}

impl Segment {
  pub fn narration(span: Range<usize>, text: impl Into<String>) -> Self {
    Segment::Narration {
      span,
      text: text.into(),
    }
  }

  pub fn span(&self) -> &Range<usize> {
    match self {
      Segment::Narration { span, .. } => span,
      Segment::Invocation(invocation) => &invocation.span,
    }
  }

  pub fn as_invocation(&self) -> Option<&Invocation> {
    match self {
      Segment::Invocation(invocation) => Some(invocation),
      Segment::Narration { .. } => None,
    }
  }

  pub fn is_invocation(&self) -> bool {
    self.as_invocation().is_some()
  }
}

/// Rebuild the source text from a segmentation of it.
///
/// Segments whose span falls outside `source` contribute nothing.
pub fn reconstruct(source: &str, segments: &[Segment]) -> String {
  let mut out = String::with_capacity(source.len());
  for segment in segments {
    if let Some(slice) = source.get(segment.span().clone()) {
      out.push_str(slice);
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn reconstruct_joins_spans_in_order() {
    let source = "hi Tool call: /img cat\nbye";
    let segments = vec![
      Segment::narration(0..3, "hi"),
      Segment::Invocation(Invocation {
        span: 3..22,
        raw_slice: "Tool call: /img cat".to_string(),
        command: "/img".to_string(),
        argument: "cat".to_string(),
      }),
      Segment::narration(22..source.len(), "bye"),
    ];

    assert_eq!(reconstruct(source, &segments), source);
    assert!(segments[1].is_invocation());
    assert_eq!(segments[2].span(), &(22..26));
  }

  #[test]
  fn segment_serializes_with_type_tag() {
    let json = serde_json::to_value(Segment::narration(0..2, "ok")).expect("serialize");
    assert_eq!(json["type"], "narration");
    assert_eq!(json["text"], "ok");
    assert_eq!(json["span"]["end"], 2);
  }
}
