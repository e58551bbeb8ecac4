// Invocation scanner
// Finds tool-call headers and works out how far each argument reaches

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Header at the start of a line: optional indent, optional inline-code
/// backtick, the `Tool call:` marker and a `/command` token.
#[allow(clippy::expect_used)]
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?im)^[ \t]*`?[ \t]*tool[ \t]*call[ \t]*:[ \t]*/[a-z0-9-]+").expect("header regex")
});

const FENCE: &str = "```";

/// Locate every invocation in `original`.
///
/// Headers are matched against `masked` (see [`crate::parse::mask`]) so
/// that nothing inside a reasoning span is reported; argument extents are
/// measured against `original`. Both strings must have the same length.
/// The returned ranges are sorted and never overlap.
pub fn scan(masked: &str, original: &str) -> Vec<Range<usize>> {
  debug_assert_eq!(masked.len(), original.len());

  let mut spans: Vec<Range<usize>> = Vec::new();
  for header in HEADER_RE.find_iter(masked) {
    // The indent may be blanked reasoning; the span starts at the marker.
    let matched = header.as_str();
    let start = header.start() + matched.len() - matched.trim_start().len();
    // A header swallowed by the previous argument belongs to that argument.
    if spans.last().is_some_and(|prev| start < prev.end) {
      continue;
    }
    let end = extend_argument(original, header.end());
    spans.push(start..end);
  }

  debug!(headers = spans.len(), "scanned completion for invocations");
  spans
}

/// End offset of the argument whose header finishes at `header_end`.
///
/// Grammars are tried in order: a quote opened on the header line that
/// does not close there, a fence opened on the header line, any other
/// same-line argument (ends at the line end), then for a bare header a
/// fenced block or a quote on the following lines.
fn extend_argument(src: &str, header_end: usize) -> usize {
  let line_end = src[header_end..]
    .find('\n')
    .map_or(src.len(), |idx| header_end + idx);
  let rest = src[header_end..line_end].trim_start_matches([' ', '\t']);

  // Same-line quote left open
  if let Some(quote) = rest.chars().next().filter(|c| is_quote(*c))
    && !closes_on_same_line(rest, quote)
  {
    let open = line_end - rest.len();
    return close_quote(src, open + 1, quote).unwrap_or(src.len());
  }

  if rest.starts_with(FENCE) {
    let body = line_end - rest.len() + FENCE.len();
    return src[body..]
      .find(FENCE)
      .map_or(src.len(), |idx| body + idx + FENCE.len());
  }

  // Anything but a closing inline backtick makes this a one-line call
  if !rest.trim_start_matches('`').trim().is_empty() {
    return line_end;
  }

  let mut cursor = header_end;
  cursor += src[cursor..].len() - src[cursor..].trim_start_matches('`').len();
  cursor += src[cursor..].len() - src[cursor..].trim_start().len();
  let tail = &src[cursor..];

  if tail.starts_with(FENCE) {
    let body = cursor + FENCE.len();
    return src[body..]
      .find(FENCE)
      .map_or(src.len(), |idx| body + idx + FENCE.len());
  }

  if let Some(quote) = tail.chars().next().filter(|c| is_quote(*c)) {
    return close_quote(src, cursor + 1, quote).unwrap_or(src.len());
  }

  line_end
}

fn is_quote(c: char) -> bool {
  c == '"' || c == '\''
}

/// Whether `rest` (which opens with `quote`) also ends with an unescaped `quote`.
fn closes_on_same_line(rest: &str, quote: char) -> bool {
  let trimmed = rest.trim_end();
  if trimmed.len() < 2 || !trimmed.ends_with(quote) {
    return false;
  }
  !trimmed[..trimmed.len() - 1].ends_with('\\')
}

/// Offset just past the first `quote` at or after `from` that is not
/// preceded by a backslash.
pub(crate) fn close_quote(src: &str, from: usize, quote: char) -> Option<usize> {
  let mut prev = src[..from].chars().next_back();
  for (offset, c) in src[from..].char_indices() {
    if c == quote && prev != Some('\\') {
      return Some(from + offset + c.len_utf8());
    }
    prev = Some(c);
  }
  None
}
