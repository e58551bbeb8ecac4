// Canonicalizer
// Splits an invocation slice into command and argument

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static MARKER_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)tool\s*call\s*:").expect("marker regex"));

#[allow(clippy::expect_used)]
static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?is)^\s*`?\s*tool\s*call\s*:\s*(/[a-z0-9-]+)(.*)$").expect("line regex")
});

const FENCE: &str = "```";

const WRAPPERS: &[(char, char)] = &[
  ('"', '"'),
  ('\'', '\''),
  ('`', '`'),
  ('(', ')'),
  ('[', ']'),
  ('{', '}'),
  ('\u{201c}', '\u{201d}'),
  ('\u{2018}', '\u{2019}'),
];

/// Command and argument recovered from an invocation slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalLine {
  /// Lowercased, slash-prefixed command token.
  pub command: String,
  /// Argument with one layer of quoting or fencing removed.
  pub argument: String,
}

/// Header line split into its parts, before any argument unwrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeaderLine<'a> {
  pub command: String,
  pub rest: &'a str,
}

/// Parse an invocation slice. Anything before the `Tool call:` marker is
/// discarded; `None` when the marker or the command token is missing.
pub fn canonicalize(raw_slice: &str) -> Option<CanonicalLine> {
  let marker = MARKER_RE.find(raw_slice)?;
  let header = parse_header_line(&raw_slice[marker.start()..])?;
  Some(CanonicalLine {
    command: header.command,
    argument: unwrap_argument(header.rest),
  })
}

/// Match the header grammar against the start of `line`.
///
/// A backtick directly after the command token closes an inline-code
/// header and is not part of the argument.
pub(crate) fn parse_header_line(line: &str) -> Option<HeaderLine<'_>> {
  let caps = LINE_RE.captures(line)?;
  let command = caps.get(1)?.as_str().to_ascii_lowercase();
  let mut rest = caps.get(2).map_or("", |m| m.as_str());
  if rest.starts_with('`') && !rest.starts_with(FENCE) {
    rest = rest.trim_start_matches('`');
  }
  Some(HeaderLine {
    command,
    rest: rest.trim(),
  })
}

/// Remove one layer of fencing or symmetric wrapping from `rest`.
pub(crate) fn unwrap_argument(rest: &str) -> String {
  let rest = rest.trim();
  if rest.starts_with(FENCE) {
    return unwrap_fence(rest);
  }
  strip_wrapper(rest).to_string()
}

fn unwrap_fence(rest: &str) -> String {
  let after_open = &rest[FENCE.len()..];
  // The info string (e.g. ```text) ends at the first newline.
  let body_start = after_open.find('\n').map_or(0, |idx| idx + 1);
  let body = &after_open[body_start..];

  let merged = match body.rfind(FENCE) {
    Some(close) => {
      let interior = body[..close].trim();
      let tail = body[close + FENCE.len()..].trim();
      if tail.is_empty() {
        interior.to_string()
      } else {
        format!("{interior}\n{tail}")
      }
    }
    None => body.trim().to_string(),
  };

  strip_quotes(&merged).to_string()
}

/// Strip a matching `"` or `'` pair whose closing quote is not escaped.
fn strip_quotes(text: &str) -> &str {
  let trimmed = text.trim();
  for quote in ['"', '\''] {
    if let Some(inner) = trimmed
      .strip_prefix(quote)
      .and_then(|t| t.strip_suffix(quote))
      && !inner.ends_with('\\')
    {
      return inner.trim();
    }
  }
  trimmed
}

/// Strip exactly one layer of a symmetric wrapper pair.
fn strip_wrapper(text: &str) -> &str {
  for (open, close) in WRAPPERS {
    if let Some(inner) = text
      .strip_prefix(*open)
      .and_then(|t| t.strip_suffix(*close))
    {
      return inner.trim();
    }
  }
  text
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn parts(raw: &str) -> (String, String) {
    let line = canonicalize(raw).expect("canonical line");
    (line.command, line.argument)
  }

  #[test]
  fn leading_garbage_is_discarded() {
    assert_eq!(
      parts("garbage Tool call: /img  \"a cat\""),
      ("/img".to_string(), "a cat".to_string())
    );
  }

  #[test]
  fn missing_marker_or_command_yields_none() {
    assert_eq!(canonicalize("just some text"), None);
    assert_eq!(canonicalize("Tool call: no command"), None);
  }

  #[test]
  fn command_is_lowercased() {
    assert_eq!(parts("TOOL CALL: /WEB rust").0, "/web");
  }

  #[test]
  fn one_wrapper_layer_is_removed() {
    assert_eq!(parts("Tool call: /img (a (nested) cat)").1, "a (nested) cat");
    assert_eq!(parts("Tool call: /img [x]").1, "x");
    assert_eq!(parts("Tool call: /img {x}").1, "x");
    assert_eq!(parts("Tool call: /img `x`").1, "x");
    assert_eq!(parts("Tool call: /img ''quoted''").1, "'quoted'");
    assert_eq!(parts("Tool call: /img \u{201c}smart\u{201d}").1, "smart");
  }

  #[test]
  fn unwrapped_argument_is_verbatim() {
    assert_eq!(parts("Tool call: /web rust async book").1, "rust async book");
    assert_eq!(parts("Tool call: /music").1, "");
  }

  #[test]
  fn inline_code_header_drops_its_closing_backtick() {
    assert_eq!(
      parts("`Tool call: /music`\n```\nsoft piano\n\nla la la\n```"),
      ("/music".to_string(), "soft piano\n\nla la la".to_string())
    );
    assert_eq!(parts("`Tool call: /img` a cat").1, "a cat");
  }

  #[test]
  fn fence_with_info_string_and_trailing_quote() {
    assert_eq!(parts("Tool call: /web\n```text\nquery here\n```").1, "query here");
    assert_eq!(
      parts("Tool call: /music ```\n\"upbeat\n```\nsecond line\"").1,
      "upbeat\nsecond line"
    );
  }

  #[test]
  fn escaped_closing_quote_is_kept() {
    assert_eq!(
      parts("Tool call: /web ```\n\"ends with \\\"\n```").1,
      "\"ends with \\\""
    );
  }

  #[test]
  fn multiline_quoted_argument() {
    assert_eq!(
      parts("Tool call: /music \"verse\n\nchorus\"").1,
      "verse\n\nchorus"
    );
  }
}
