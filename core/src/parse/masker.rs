// Reasoning span masking
// Blanks out <think> blocks and ```think fences without moving offsets

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static THINK_OPEN_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)<\s*think\s*>").expect("think open regex"));
#[allow(clippy::expect_used)]
static THINK_CLOSE_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)<\s*/\s*think\s*>").expect("think close regex"));
#[allow(clippy::expect_used)]
static THINKING_OPEN_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)<\s*thinking\s*>").expect("thinking open regex"));
#[allow(clippy::expect_used)]
static THINKING_CLOSE_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)<\s*/\s*thinking\s*>").expect("thinking close regex"));
#[allow(clippy::expect_used)]
static FENCE_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)```[ \t]*(?:think|thinking|thoughts?)[^\n]*\n").expect("think fence regex")
});

const FENCE: &str = "```";

/// Byte ranges of every reasoning span in `text`, sorted and merged.
///
/// A span without a closing marker runs to the end of the text.
pub fn reasoning_spans(text: &str) -> Vec<Range<usize>> {
  let mut spans = Vec::new();
  collect_tag_spans(text, &THINK_OPEN_RE, &THINK_CLOSE_RE, &mut spans);
  collect_tag_spans(text, &THINKING_OPEN_RE, &THINKING_CLOSE_RE, &mut spans);
  collect_fence_spans(text, &mut spans);
  merge_spans(spans)
}

/// Replace every character inside a reasoning span with spaces.
///
/// Multi-byte characters become as many spaces as they have bytes, so the
/// result has the same byte length and every offset stays valid against
/// the input.
pub fn mask(text: &str) -> String {
  let spans = reasoning_spans(text);
  if spans.is_empty() {
    return text.to_string();
  }

  let mut masked = String::with_capacity(text.len());
  let mut cursor = 0;
  for span in spans {
    masked.push_str(&text[cursor..span.start]);
    masked.extend(std::iter::repeat_n(' ', span.end - span.start));
    cursor = span.end;
  }
  masked.push_str(&text[cursor..]);
  masked
}

fn collect_tag_spans(text: &str, open: &Regex, close: &Regex, out: &mut Vec<Range<usize>>) {
  let mut from = 0;
  while let Some(opening) = open.find_at(text, from) {
    let end = close
      .find_at(text, opening.end())
      .map_or(text.len(), |closing| closing.end());
    out.push(opening.start()..end);
    from = end;
    if from >= text.len() {
      break;
    }
  }
}

fn collect_fence_spans(text: &str, out: &mut Vec<Range<usize>>) {
  let mut from = 0;
  while let Some(opening) = FENCE_OPEN_RE.find_at(text, from) {
    let end = text[opening.end()..]
      .find(FENCE)
      .map_or(text.len(), |idx| opening.end() + idx + FENCE.len());
    out.push(opening.start()..end);
    from = end;
    if from >= text.len() {
      break;
    }
  }
}

/// Sort by start and coalesce overlapping or touching ranges.
pub(crate) fn merge_spans(mut spans: Vec<Range<usize>>) -> Vec<Range<usize>> {
  spans.sort_by_key(|span| span.start);
  let mut merged: Vec<Range<usize>> = Vec::with_capacity(spans.len());
  for span in spans {
    match merged.last_mut() {
      Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
      _ => merged.push(span),
    }
  }
  merged
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn tag_spans_are_blanked_in_place() {
    let text = "a<think>Tool call: /img x</think>b";
    let masked = mask(text);
    assert_eq!(masked.len(), text.len());
    assert!(masked.starts_with('a') && masked.ends_with('b'));
    assert!(!masked.contains("Tool"));
  }

  #[test]
  fn tags_tolerate_case_and_whitespace() {
    let text = "< THINKING >hidden< / Thinking >shown";
    assert_eq!(reasoning_spans(text), vec![0..32]);
    assert_eq!(mask(text).trim(), "shown");
  }

  #[test]
  fn unterminated_spans_run_to_end() {
    let text = "ok <think>still going";
    assert_eq!(reasoning_spans(text), vec![3..text.len()]);

    let fenced = "ok\n```thinking about it\nTool call: /img";
    assert_eq!(reasoning_spans(fenced), vec![3..fenced.len()]);
  }

  #[test]
  fn fence_span_includes_closing_fence() {
    let text = "```thoughts\nplan\n```\nafter";
    let spans = reasoning_spans(text);
    assert_eq!(spans, vec![0..20]);
    assert_eq!(&mask(text)[20..], "\nafter");
  }

  #[test]
  fn overlapping_and_touching_spans_merge() {
    assert_eq!(merge_spans(vec![5..9, 0..3, 3..4, 8..12]), vec![0..4, 5..12]);
  }

  #[test]
  fn masking_preserves_byte_length_for_multibyte_text() {
    let text = "héllo <think>ça va → oui</think> fin";
    let masked = mask(text);
    assert_eq!(masked.len(), text.len());
    assert_eq!(&masked[..7], "héllo ");
    assert!(masked.ends_with(" fin"));
  }

  #[test]
  fn masking_is_idempotent() {
    let text = "x <think>a</think> ```think\nb\n``` y";
    let once = mask(text);
    assert_eq!(mask(&once), once);
  }
}
