//! ACE-Step music provider

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;
use weave_config::{AudioFormat, MusicProviderConfig};
use weave_protocol::MediaPayload;

use super::audio::split_audio;
use super::{check_status, create_client, require_argument, require_endpoint};
use crate::dispatch::context::{ProviderError, ProviderOutput, Result};
use crate::dispatch::registry::CapabilityProvider;

#[allow(clippy::expect_used)]
static BLANK_LINE_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\n\s*\n").expect("blank line regex"));

/// `/music`: song generation. The argument's first paragraph is the style
/// prompt, everything after the first blank line is lyrics.
pub struct MusicProvider {
  client: Client,
  endpoint: String,
  checkpoint_path: String,
  duration_secs: u32,
  steps: u32,
  format: AudioFormat,
  upload_limit: usize,
  timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  output_path: Option<String>,
  #[serde(default)]
  audio_data: Option<String>,
}

impl MusicProvider {
  pub fn from_config(config: &MusicProviderConfig) -> Result<Self> {
    Ok(Self {
      client: create_client(Some(config.timeout_secs)),
      endpoint: require_endpoint("music", config.endpoint.as_deref())?,
      checkpoint_path: config.checkpoint_path.clone(),
      duration_secs: config.duration_secs,
      steps: config.steps,
      format: config.format,
      upload_limit: config.upload_limit_bytes.max(1),
      timeout: Duration::from_secs(config.timeout_secs),
    })
  }

  fn payload(&self, prompt: &str, lyrics: &str) -> serde_json::Value {
    let extension = self.format.extension();
    let seed = Uuid::new_v4().as_u128() as u32;
    json!({
      "checkpoint_path": self.checkpoint_path,
      "bf16": true,
      "torch_compile": false,
      "device_id": 0,
      "audio_duration": self.duration_secs,
      "prompt": prompt,
      "lyrics": lyrics,
      "infer_step": self.steps,
      "guidance_scale": 15,
      "scheduler_type": "euler",
      "cfg_type": "apg",
      "omega_scale": 10,
      "manual_seeds": [seed],
      "guidance_interval": 0.5,
      "guidance_interval_decay": 0,
      "min_guidance_scale": 3,
      "use_erg_tag": true,
      "use_erg_lyric": false,
      "use_erg_diffusion": true,
      "oss_steps": [],
      "guidance_scale_text": 0,
      "guidance_scale_lyric": 0,
      "format": extension,
      "output_path": format!(
        "./outputs/output_{}.{extension}",
        chrono::Utc::now().timestamp_millis()
      ),
    })
  }

  async fn read_audio(&self, response: GenerateResponse) -> Result<Vec<u8>> {
    if let Some(encoded) = response.audio_data.filter(|d| !d.trim().is_empty()) {
      return STANDARD
        .decode(encoded.trim())
        .map_err(|e| ProviderError::InvalidResponse(format!("audio_data is not base64: {e}")));
    }
    match response.output_path {
      Some(path) => {
        debug!(%path, "Reading generated audio from disk");
        Ok(tokio::fs::read(&path).await?)
      }
      None => Err(ProviderError::InvalidResponse(
        "response has neither audio_data nor output_path".to_string(),
      )),
    }
  }
}

#[async_trait]
impl CapabilityProvider for MusicProvider {
  fn command(&self) -> &str {
    "/music"
  }

  fn timeout(&self) -> Duration {
    self.timeout
  }

  async fn invoke(&self, argument: &str) -> Result<ProviderOutput> {
    require_argument(argument, "music prompt")?;
    let (prompt, lyrics) = split_music_argument(argument);

    let response = self
      .client
      .post(&self.endpoint)
      .json(&self.payload(prompt, lyrics))
      .send()
      .await?;
    let body: GenerateResponse = check_status(response).await?.json().await?;
    let audio = self.read_audio(body).await?;

    split_for_upload(audio, self.format, self.upload_limit)
  }
}

/// Split at the first blank line into `(prompt, lyrics)`.
pub fn split_music_argument(argument: &str) -> (&str, &str) {
  match BLANK_LINE_RE.find(argument) {
    Some(gap) => (argument[..gap.start()].trim(), argument[gap.end()..].trim()),
    None => (argument.trim(), ""),
  }
}

/// One payload when it fits, otherwise ordered `segment_<n>` parts that
/// each play on their own.
fn split_for_upload(audio: Vec<u8>, format: AudioFormat, limit: usize) -> Result<ProviderOutput> {
  let extension = format.extension();
  if audio.len() <= limit {
    return Ok(ProviderOutput::Media(
      MediaPayload::new(format.mime_type(), audio).with_file_name(format!("music.{extension}")),
    ));
  }

  let parts: Vec<MediaPayload> = split_audio(&audio, format, limit)?
    .into_iter()
    .enumerate()
    .map(|(n, part)| {
      MediaPayload::new(format.mime_type(), part)
        .with_file_name(format!("segment_{}.{extension}", n + 1))
    })
    .collect();
  debug!(parts = parts.len(), bytes = audio.len(), "Split generated audio for upload");
  Ok(ProviderOutput::MediaSequence(parts))
}
