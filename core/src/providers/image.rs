//! Stable Diffusion Forge image provider

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use weave_config::ImageProviderConfig;
use weave_protocol::MediaPayload;

use super::{check_status, create_client, require_argument, require_endpoint};
use crate::dispatch::context::{ProviderError, ProviderOutput, Result};
use crate::dispatch::registry::CapabilityProvider;

/// `/img`: text-to-image through the Forge `txt2img` API
pub struct ImageProvider {
  client: Client,
  base_url: String,
  steps: u32,
  timeout: Duration,
}

#[derive(Serialize)]
struct Txt2ImgRequest<'a> {
  prompt: &'a str,
  steps: u32,
}

#[derive(Deserialize)]
struct Txt2ImgResponse {
  #[serde(default)]
  images: Vec<String>,
}

impl ImageProvider {
  pub fn from_config(config: &ImageProviderConfig) -> Result<Self> {
    Ok(Self {
      client: create_client(Some(config.timeout_secs)),
      base_url: require_endpoint("image", config.endpoint.as_deref())?,
      steps: config.steps,
      timeout: Duration::from_secs(config.timeout_secs),
    })
  }

  fn endpoint(&self) -> String {
    format!("{}/sdapi/v1/txt2img", self.base_url)
  }
}

#[async_trait]
impl CapabilityProvider for ImageProvider {
  fn command(&self) -> &str {
    "/img"
  }

  fn timeout(&self) -> Duration {
    self.timeout
  }

  async fn invoke(&self, argument: &str) -> Result<ProviderOutput> {
    require_argument(argument, "image prompt")?;

    let response = self
      .client
      .post(self.endpoint())
      .json(&Txt2ImgRequest {
        prompt: argument,
        steps: self.steps,
      })
      .send()
      .await?;
    let body: Txt2ImgResponse = check_status(response).await?.json().await?;

    let encoded = body
      .images
      .into_iter()
      .next()
      .ok_or_else(|| ProviderError::InvalidResponse("txt2img returned no images".to_string()))?;
    let bytes = STANDARD
      .decode(encoded.trim())
      .map_err(|e| ProviderError::InvalidResponse(format!("image is not base64: {e}")))?;

    Ok(ProviderOutput::Media(
      MediaPayload::new("image/png", bytes).with_file_name("image.png"),
    ))
  }
}
