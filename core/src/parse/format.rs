// Display helpers for narration and invocations

use std::sync::LazyLock;

use regex::Regex;

use crate::parse::canonical::parse_header_line;
use crate::parse::masker::reasoning_spans;

#[allow(clippy::expect_used)]
static BLANK_LINES_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank line regex"));

/// Pretty-print an invocation slice as an inline-code header followed by
/// its argument in a fenced block. Slices that do not start with a header
/// are returned trimmed.
pub fn format_invocation(raw_slice: &str) -> String {
  let Some(header) = parse_header_line(raw_slice) else {
    return raw_slice.trim().to_string();
  };

  let code = format!("`Tool call: {}`", header.command);
  let argument = normalize_edge_quotes(header.rest);
  if argument.is_empty() {
    return code;
  }
  if argument.starts_with("```") {
    return format!("{code}\n{argument}");
  }
  format!("{code}\n```\n{argument}\n```")
}

/// Remove reasoning spans from narration and tidy the blank lines they leave.
pub fn strip_reasoning(text: &str) -> String {
  let spans = reasoning_spans(text);
  let mut kept = String::with_capacity(text.len());
  let mut cursor = 0;
  for span in spans {
    kept.push_str(&text[cursor..span.start]);
    cursor = span.end;
  }
  kept.push_str(&text[cursor..]);
  BLANK_LINES_RE.replace_all(&kept, "\n\n").trim().to_string()
}

/// Drop a leading `"<name>:"` speaker label the model sometimes echoes.
pub fn strip_speaker_prefix<'a>(text: &'a str, speaker: &str) -> &'a str {
  let trimmed = text.trim_start();
  let Some(head) = trimmed.get(..speaker.len()) else {
    return text;
  };
  if !head.eq_ignore_ascii_case(speaker) {
    return text;
  }
  match trimmed[speaker.len()..].trim_start().strip_prefix(':') {
    Some(after) => after.trim_start(),
    None => text,
  }
}

fn normalize_edge_quotes(text: &str) -> String {
  let text = text.trim();
  let mut out = String::with_capacity(text.len());
  if let Some(rest) = text.strip_prefix('\u{201c}') {
    out.push('"');
    out.push_str(rest);
  } else if let Some(rest) = text.strip_prefix('\u{2018}') {
    out.push('\'');
    out.push_str(rest);
  } else {
    out.push_str(text);
  }
  if out.ends_with('\u{201d}') {
    out.truncate(out.len() - '\u{201d}'.len_utf8());
    out.push('"');
  } else if out.ends_with('\u{2019}') {
    out.truncate(out.len() - '\u{2019}'.len_utf8());
    out.push('\'');
  }
  out
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn formats_header_and_fenced_argument() {
    assert_eq!(
      format_invocation("Tool call: /img \u{201c}a cat\u{201d}"),
      "`Tool call: /img`\n```\n\"a cat\"\n```"
    );
  }

  #[test]
  fn header_only_and_prefenced_arguments() {
    assert_eq!(format_invocation("`Tool call: /music`"), "`Tool call: /music`");
    assert_eq!(
      format_invocation("Tool call: /music\n```\nla la\n```"),
      "`Tool call: /music`\n```\nla la\n```"
    );
  }

  #[test]
  fn non_header_text_is_returned_trimmed() {
    assert_eq!(format_invocation("  hello  "), "hello");
  }

  #[test]
  fn strip_reasoning_removes_spans_and_blank_runs() {
    assert_eq!(
      strip_reasoning("<think>plan</think>\n\n\n\nHello\n\n\n\nworld"),
      "Hello\n\nworld"
    );
    assert_eq!(strip_reasoning("```thinking\nhmm\n```\nDone"), "Done");
  }

  #[test]
  fn speaker_prefix_is_stripped_case_insensitively() {
    assert_eq!(strip_speaker_prefix("Weave: hi there", "weave"), "hi there");
    assert_eq!(strip_speaker_prefix("  WEAVE : hi", "Weave"), "hi");
    assert_eq!(strip_speaker_prefix("Weaver: hi", "Weave"), "Weaver: hi");
    assert_eq!(strip_speaker_prefix("hi", "Weave"), "hi");
  }
}
