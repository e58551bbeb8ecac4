// Segmenter
// Partitions a completion into narration and invocation segments

use std::ops::Range;

use weave_protocol::{Invocation, Segment};

use crate::parse::canonical::canonicalize;
use crate::parse::masker::mask;
use crate::parse::scanner::scan;

/// Decompose `text` into ordered segments whose spans tile it exactly.
///
/// Without any invocation the whole text is a single narration segment.
/// Zero-length gaps between invocations produce no segment; whitespace-only
/// gaps produce a narration segment with empty text so the spans still
/// cover the input.
pub fn segment(text: &str) -> Vec<Segment> {
  let masked = mask(text);
  let spans = scan(&masked, text);
  if spans.is_empty() {
    return vec![Segment::narration(0..text.len(), text.trim())];
  }

  let mut segments = Vec::with_capacity(spans.len() * 2 + 1);
  let mut cursor = 0;
  for span in spans {
    if span.start > cursor {
      segments.push(narration(text, cursor..span.start));
    }
    cursor = span.end;
    segments.push(Segment::Invocation(invocation(text, span)));
  }
  if cursor < text.len() {
    segments.push(narration(text, cursor..text.len()));
  }
  segments
}

fn narration(text: &str, span: Range<usize>) -> Segment {
  let content = text[span.clone()].trim();
  Segment::narration(span, content)
}

fn invocation(text: &str, span: Range<usize>) -> Invocation {
  let raw_slice = text[span.clone()].trim().to_string();
  let (command, argument) = match canonicalize(&raw_slice) {
    Some(line) => (line.command, line.argument),
    None => (String::new(), String::new()),
  };
  Invocation {
    span,
    raw_slice,
    command,
    argument,
  }
}
