// Environment interpolation
// Expands ${VAR} and ${VAR:-default} placeholders in configuration text

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
  #[allow(clippy::expect_used)]
  Regex::new(r"\$\{([^:}]+)(?::-([^}]*))?\}").expect("placeholder regex")
});

/// Replace every placeholder with the variable's value, its inline default,
/// or the empty string.
pub fn interpolate(text: &str, env: &HashMap<String, String>) -> String {
  PLACEHOLDER_RE
    .replace_all(text, |caps: &Captures<'_>| {
      let key = caps[1].trim();
      env
        .get(key)
        .cloned()
        .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
        .unwrap_or_default()
    })
    .into_owned()
}
