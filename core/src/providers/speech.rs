//! AllTalk text-to-speech provider

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use weave_config::SpeechProviderConfig;
use weave_protocol::MediaPayload;

use super::{check_status, create_client, require_argument, require_endpoint};
use crate::dispatch::context::{ProviderError, ProviderOutput, Result};
use crate::dispatch::registry::CapabilityProvider;

const GENERATE_SUCCESS: &str = "generate-success";

/// `/speak`: synthesize speech and download the resulting WAV
pub struct SpeechProvider {
  client: Client,
  base_url: String,
  voice: String,
  timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  status: String,
  #[serde(default)]
  output_file_url: Option<String>,
}

impl SpeechProvider {
  pub fn from_config(config: &SpeechProviderConfig) -> Result<Self> {
    Ok(Self {
      client: create_client(Some(config.timeout_secs)),
      base_url: require_endpoint("speech", config.endpoint.as_deref())?,
      voice: config.voice.clone(),
      timeout: Duration::from_secs(config.timeout_secs),
    })
  }
}

#[async_trait]
impl CapabilityProvider for SpeechProvider {
  fn command(&self) -> &str {
    "/speak"
  }

  fn timeout(&self) -> Duration {
    self.timeout
  }

  async fn invoke(&self, argument: &str) -> Result<ProviderOutput> {
    require_argument(argument, "speech text")?;

    let response = self
      .client
      .post(format!("{}/api/tts-generate", self.base_url))
      .form(&[
        ("text_input", argument),
        ("text_filtering", "standard"),
        ("character_voice_gen", self.voice.as_str()),
        ("output_file_timestamp", "true"),
      ])
      .send()
      .await?;
    let body: GenerateResponse = check_status(response).await?.json().await?;

    if body.status != GENERATE_SUCCESS {
      return Err(ProviderError::InvalidResponse(format!(
        "AllTalk generation failed (status `{}`)",
        body.status
      )));
    }
    let file_url = body
      .output_file_url
      .filter(|url| !url.is_empty())
      .ok_or_else(|| ProviderError::InvalidResponse("missing output_file_url".to_string()))?;

    let download = self
      .client
      .get(format!("{}{}", self.base_url, file_url))
      .send()
      .await?;
    let bytes = check_status(download).await?.bytes().await?;

    Ok(ProviderOutput::Media(
      MediaPayload::new("audio/wav", bytes.to_vec()).with_file_name("speech.wav"),
    ))
  }
}
