// Configuration Types
// All configuration type definitions

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  /// Segmentation and reassembly behaviour
  pub pipeline: PipelineConfig,
  /// Output unit sizing
  pub delivery: DeliveryConfig,
  /// Provider dispatch
  pub dispatch: DispatchConfig,
  /// Capability providers
  pub providers: ProvidersConfig,
}

impl Config {
  /// Reject settings the engine cannot run with.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.delivery.max_unit_size == 0 {
      return Err(ConfigError::Invalid(
        "delivery.max_unit_size must be greater than zero".to_string(),
      ));
    }
    if self.delivery.text_result_unit_size == 0 {
      return Err(ConfigError::Invalid(
        "delivery.text_result_unit_size must be greater than zero".to_string(),
      ));
    }
    if self.delivery.continuation_marker.chars().count() >= self.delivery.text_result_unit_size {
      return Err(ConfigError::Invalid(
        "delivery.continuation_marker must be shorter than text_result_unit_size".to_string(),
      ));
    }
    if self.dispatch.max_concurrency == 0 {
      return Err(ConfigError::Invalid(
        "dispatch.max_concurrency must be at least 1".to_string(),
      ));
    }
    self.dispatch.retry.validate()?;
    self.providers.validate()
  }

  /// Copy safe to print: secrets are masked.
  pub fn redacted(&self) -> Self {
    let mut config = self.clone();
    if let Some(key) = config.providers.search.api_key.as_mut() {
      *key = REDACTED.to_string();
    }
    config
  }
}

const REDACTED: &str = "********";

// ============================================================================
// PIPELINE CONFIGURATION
// ============================================================================

/// Pipeline behaviour flags
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
  /// Dispatch tool invocations found in model output
  pub tools_enabled: bool,
  /// Remove reasoning spans from delivered narration
  pub hide_reasoning: bool,
  /// Deliver a formatted copy of each invocation before its result
  pub echo_invocations: bool,
  /// Leading `"<name>:"` prefix stripped from the reply
  #[serde(skip_serializing_if = "Option::is_none")]
  pub speaker_name: Option<String>,
  /// Narration delivered when nothing else was produced
  pub fallback_message: String,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      tools_enabled: true,
      hide_reasoning: true,
      echo_invocations: false,
      speaker_name: None,
      fallback_message: "I couldn't come up with a response for that.".to_string(),
    }
  }
}

// ============================================================================
// DELIVERY CONFIGURATION
// ============================================================================

/// Output unit sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeliveryConfig {
  /// Maximum characters per narration unit
  pub max_unit_size: usize,
  /// Maximum characters per textual result unit
  pub text_result_unit_size: usize,
  /// Appended to every textual result unit that is continued in the next one
  pub continuation_marker: String,
  /// Drop narration that follows an invocation whose result was text
  pub suppress_narration_after_text_result: bool,
}

impl Default for DeliveryConfig {
  fn default() -> Self {
    Self {
      max_unit_size: 1_800,
      text_result_unit_size: 1_990,
      continuation_marker: " …".to_string(),
      suppress_narration_after_text_result: false,
    }
  }
}

// ============================================================================
// DISPATCH CONFIGURATION
// ============================================================================

/// Dispatch discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
  Sequential,
  #[default]
  Concurrent,
}

/// Dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
  /// Sequential or concurrent execution of one batch
  pub mode: DispatchMode,
  /// Upper bound on provider calls in flight for one batch
  pub max_concurrency: usize,
  /// Retry policy applied to every provider call
  pub retry: RetryConfig,
}

impl Default for DispatchConfig {
  fn default() -> Self {
    Self {
      mode: DispatchMode::Concurrent,
      max_concurrency: 4,
      retry: RetryConfig::default(),
    }
  }
}

/// Retry policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
  /// Total attempts per call, including the first
  pub max_attempts: u32,
  /// Delay before the second attempt
  pub initial_backoff_ms: u64,
  /// Cap on any single delay
  pub max_backoff_ms: u64,
  /// Growth factor between delays
  pub multiplier: f64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: 1,
      initial_backoff_ms: 500,
      max_backoff_ms: 8_000,
      multiplier: 2.0,
    }
  }
}

impl RetryConfig {
  fn validate(&self) -> Result<(), ConfigError> {
    if self.max_attempts == 0 {
      return Err(ConfigError::Invalid(
        "dispatch.retry.max_attempts must be at least 1".to_string(),
      ));
    }
    if !self.multiplier.is_finite() || self.multiplier < 1.0 {
      return Err(ConfigError::Invalid(
        "dispatch.retry.multiplier must be a finite number >= 1.0".to_string(),
      ));
    }
    Ok(())
  }
}

// ============================================================================
// PROVIDER CONFIGURATION
// ============================================================================

/// Capability provider settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvidersConfig {
  pub image: ImageProviderConfig,
  pub search: SearchProviderConfig,
  pub music: MusicProviderConfig,
  pub speech: SpeechProviderConfig,
}

impl ProvidersConfig {
  fn validate(&self) -> Result<(), ConfigError> {
    require_endpoint("image", self.image.enabled, &self.image.endpoint)?;
    require_endpoint("music", self.music.enabled, &self.music.endpoint)?;
    require_endpoint("speech", self.speech.enabled, &self.speech.endpoint)?;

    if self.search.enabled && self.search.api_key.as_deref().is_none_or(str::is_empty) {
      return Err(ConfigError::MissingSetting {
        provider: "search",
        setting: "api_key (TAVILY_KEY)",
      });
    }
    if self.music.enabled && self.music.upload_limit_bytes == 0 {
      return Err(ConfigError::Invalid(
        "providers.music.upload_limit_bytes must be greater than zero".to_string(),
      ));
    }
    Ok(())
  }
}

fn require_endpoint(
  provider: &'static str,
  enabled: bool,
  endpoint: &Option<String>,
) -> Result<(), ConfigError> {
  if enabled && endpoint.as_deref().is_none_or(|e| e.trim().is_empty()) {
    return Err(ConfigError::MissingSetting {
      provider,
      setting: "endpoint",
    });
  }
  Ok(())
}

/// Stable Diffusion Forge image generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageProviderConfig {
  pub enabled: bool,
  /// Base URL, e.g. `http://localhost:7860`
  #[serde(skip_serializing_if = "Option::is_none")]
  pub endpoint: Option<String>,
  /// Sampling steps
  pub steps: u32,
  pub timeout_secs: u64,
}

impl Default for ImageProviderConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      endpoint: None,
      steps: 28,
      timeout_secs: 120,
    }
  }
}

/// Tavily web search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchProviderConfig {
  pub enabled: bool,
  /// Full search URL
  pub endpoint: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub api_key: Option<String>,
  pub max_results: u32,
  pub include_answer: bool,
  pub timeout_secs: u64,
}

impl Default for SearchProviderConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      endpoint: "https://api.tavily.com/search".to_string(),
      api_key: None,
      max_results: 8,
      include_answer: true,
      timeout_secs: 30,
    }
  }
}

/// Audio container requested from the music service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
  #[default]
  Mp3,
  Wav,
  Flac,
}

impl AudioFormat {
  pub fn extension(self) -> &'static str {
    match self {
      AudioFormat::Mp3 => "mp3",
      AudioFormat::Wav => "wav",
      AudioFormat::Flac => "flac",
    }
  }

  pub fn mime_type(self) -> &'static str {
    match self {
      AudioFormat::Mp3 => "audio/mpeg",
      AudioFormat::Wav => "audio/wav",
      AudioFormat::Flac => "audio/flac",
    }
  }
}

/// ACE-Step music generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MusicProviderConfig {
  pub enabled: bool,
  /// Full `/generate` URL
  #[serde(skip_serializing_if = "Option::is_none")]
  pub endpoint: Option<String>,
  pub duration_secs: u32,
  pub format: AudioFormat,
  pub steps: u32,
  pub checkpoint_path: String,
  pub timeout_secs: u64,
  /// Largest payload a transport unit may carry
  pub upload_limit_bytes: usize,
}

impl Default for MusicProviderConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      endpoint: None,
      duration_secs: 240,
      format: AudioFormat::Mp3,
      steps: 200,
      checkpoint_path: "./checkpoints/ACE-Step-v1-3.5B".to_string(),
      timeout_secs: 480,
      upload_limit_bytes: 9_500_000,
    }
  }
}

/// AllTalk speech synthesis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeechProviderConfig {
  pub enabled: bool,
  /// Base URL of the AllTalk server
  #[serde(skip_serializing_if = "Option::is_none")]
  pub endpoint: Option<String>,
  pub voice: String,
  pub timeout_secs: u64,
}

impl Default for SpeechProviderConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      endpoint: None,
      voice: "xtts_v2".to_string(),
      timeout_secs: 120,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    Config::default().validate().expect("default config validates");
  }

  #[test]
  fn enabled_provider_without_endpoint_is_rejected() {
    let mut config = Config::default();
    config.providers.image.enabled = true;
    assert!(matches!(
      config.validate(),
      Err(ConfigError::MissingSetting {
        provider: "image",
        ..
      })
    ));
  }

  #[test]
  fn search_requires_api_key() {
    let mut config = Config::default();
    config.providers.search.enabled = true;
    assert!(config.validate().is_err());

    config.providers.search.api_key = Some("tvly-123".to_string());
    assert!(config.validate().is_ok());
  }

  #[test]
  fn redacted_copy_hides_search_key() {
    let mut config = Config::default();
    config.providers.search.api_key = Some("tvly-secret".to_string());

    let shown = toml::to_string(&config.redacted()).expect("serialize");
    assert!(!shown.contains("tvly-secret"));
    assert!(shown.contains("api_key = \"********\""));
    assert_eq!(config.providers.search.api_key.as_deref(), Some("tvly-secret"));
    assert_eq!(Config::default().redacted().providers.search.api_key, None);
  }

  #[test]
  fn zero_sizes_are_rejected() {
    let mut config = Config::default();
    config.delivery.max_unit_size = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.dispatch.retry.max_attempts = 0;
    assert!(config.validate().is_err());
  }
}
