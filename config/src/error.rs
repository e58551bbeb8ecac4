use thiserror::Error;

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
  /// A value is out of range or inconsistent with another
  #[error("invalid configuration: {0}")]
  Invalid(String),

  /// An enabled provider lacks a required setting
  #[error("provider `{provider}` is enabled but `{setting}` is not set")]
  MissingSetting {
    provider: &'static str,
    setting: &'static str,
  },
}
