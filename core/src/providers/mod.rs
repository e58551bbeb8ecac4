//! Capability providers
//!
//! HTTP-backed implementations of the built-in commands

use std::sync::Arc;

use reqwest::{Client, Response};
use tracing::info;
use weave_config::ProvidersConfig;

use crate::dispatch::context::{ProviderError, Result};
use crate::dispatch::registry::CapabilityRegistry;

pub mod audio;
pub mod image;
pub mod music;
pub mod search;
pub mod speech;

pub use image::ImageProvider;
pub use music::MusicProvider;
pub use search::SearchProvider;
pub use speech::SpeechProvider;

/// Register every provider enabled in `config`.
pub fn register_default_providers(
  registry: &mut CapabilityRegistry,
  config: &ProvidersConfig,
) -> Result<()> {
  if config.image.enabled {
    registry.register(Arc::new(ImageProvider::from_config(&config.image)?));
  }
  if config.search.enabled {
    registry.register(Arc::new(SearchProvider::from_config(&config.search)?));
  }
  if config.music.enabled {
    registry.register(Arc::new(MusicProvider::from_config(&config.music)?));
  }
  if config.speech.enabled {
    registry.register(Arc::new(SpeechProvider::from_config(&config.speech)?));
  }

  info!(commands = ?registry.commands(), "Registered capability providers");
  Ok(())
}

/// Create a reqwest client with the given timeout in seconds
pub fn create_client(timeout: Option<u64>) -> Client {
  let timeout = std::time::Duration::from_secs(timeout.unwrap_or(120));

  Client::builder()
    .timeout(timeout)
    .build()
    .unwrap_or_else(|_| Client::new())
}

/// Turn a non-success response into `ProviderError::Status`.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
  if response.status().is_success() {
    return Ok(response);
  }
  let status = response.status().as_u16();
  let body = response.text().await.unwrap_or_default();
  Err(ProviderError::Status { status, body })
}

pub(crate) fn require_endpoint(provider: &str, endpoint: Option<&str>) -> Result<String> {
  match endpoint.map(str::trim) {
    Some(endpoint) if !endpoint.is_empty() => Ok(endpoint.trim_end_matches('/').to_string()),
    _ => Err(ProviderError::MissingConfig(format!(
      "providers.{provider}.endpoint is not set"
    ))),
  }
}

pub(crate) fn require_argument(argument: &str, what: &str) -> Result<()> {
  if argument.trim().is_empty() {
    return Err(ProviderError::InvalidArgument(format!("{what} is empty")));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use weave_config::Config;

  use super::*;

  #[test]
  fn only_enabled_providers_are_registered() {
    let mut config = Config::default();
    config.providers.image.enabled = true;
    config.providers.image.endpoint = Some("http://localhost:7860/".to_string());
    config.providers.search.enabled = true;
    config.providers.search.api_key = Some("tvly-test".to_string());

    let mut registry = CapabilityRegistry::new();
    register_default_providers(&mut registry, &config.providers).expect("register");
    assert_eq!(registry.commands(), vec!["/img", "/web"]);
  }

  #[test]
  fn enabled_provider_without_endpoint_fails() {
    let mut config = Config::default();
    config.providers.music.enabled = true;

    let mut registry = CapabilityRegistry::new();
    let err = register_default_providers(&mut registry, &config.providers)
      .expect_err("music without endpoint");
    assert!(matches!(err, ProviderError::MissingConfig(_)));
  }
}
