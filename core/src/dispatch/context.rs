use thiserror::Error;
use weave_protocol::{CapabilityResult, FailureKind, MediaPayload};

/// What a provider hands back on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutput {
  Text(String),
  Media(MediaPayload),
  /// Ordered parts of one output too large for a single transport unit.
  MediaSequence(Vec<MediaPayload>),
}

impl ProviderOutput {
  /// Flatten into results; a sequence yields one `Media` result per part.
  pub fn into_results(self) -> Vec<CapabilityResult> {
    match self {
      ProviderOutput::Text(content) => vec![CapabilityResult::Text { content }],
      ProviderOutput::Media(payload) => vec![CapabilityResult::Media(payload)],
      ProviderOutput::MediaSequence(parts) => {
        parts.into_iter().map(CapabilityResult::Media).collect()
      }
    }
  }
}

/// Capability provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
  /// Network error
  #[error("Network error: {0}")]
  Http(#[from] reqwest::Error),

  /// Non-success HTTP status
  #[error("Provider returned HTTP {status}: {body}")]
  Status { status: u16, body: String },

  /// Invalid response from provider
  #[error("Invalid response: {0}")]
  InvalidResponse(String),

  /// The argument cannot be sent to this provider
  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  /// Provider is registered but not configured
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  /// Provider did not answer in time
  #[error("Request timeout: {0}")]
  Timeout(String),

  #[error("{0}")]
  Other(String),
}

impl ProviderError {
  /// Transient failures worth another attempt: timeouts, connection
  /// errors, HTTP 429 and 5xx.
  pub fn is_retryable(&self) -> bool {
    match self {
      ProviderError::Http(err) => err.is_timeout() || err.is_connect(),
      ProviderError::Status { status, .. } => *status == 429 || (500..=599).contains(status),
      ProviderError::Timeout(_) => true,
      _ => false,
    }
  }

  pub fn failure_kind(&self) -> FailureKind {
    match self {
      ProviderError::Timeout(_) => FailureKind::Timeout,
      ProviderError::Http(err) if err.is_timeout() => FailureKind::Timeout,
      _ => FailureKind::Provider,
    }
  }

  pub fn into_result(self) -> CapabilityResult {
    CapabilityResult::failure(self.failure_kind(), self.to_string())
  }
}

/// Alias for Result<T, ProviderError>
pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn sequence_flattens_in_order() {
    let output = ProviderOutput::MediaSequence(vec![
      MediaPayload::new("audio/mpeg", vec![1]).with_file_name("segment_1.mp3"),
      MediaPayload::new("audio/mpeg", vec![2]).with_file_name("segment_2.mp3"),
    ]);
    let names: Vec<_> = output
      .into_results()
      .into_iter()
      .map(|r| match r {
        CapabilityResult::Media(p) => p.file_name.unwrap_or_default(),
        other => panic!("unexpected {other:?}"),
      })
      .collect();
    assert_eq!(names, vec!["segment_1.mp3", "segment_2.mp3"]);
  }

  #[test]
  fn retryable_statuses() {
    let status = |status| ProviderError::Status {
      status,
      body: String::new(),
    };
    assert!(status(429).is_retryable());
    assert!(status(503).is_retryable());
    assert!(!status(400).is_retryable());
    assert!(!status(401).is_retryable());
    assert!(ProviderError::Timeout("slow".into()).is_retryable());
    assert!(!ProviderError::InvalidResponse("bad".into()).is_retryable());
  }

  #[test]
  fn timeout_maps_to_timeout_kind() {
    let result = ProviderError::Timeout("/img did not answer within 1s".into()).into_result();
    assert_eq!(
      result,
      CapabilityResult::failure(
        FailureKind::Timeout,
        "Request timeout: /img did not answer within 1s"
      )
    );
  }
}
