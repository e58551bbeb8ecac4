use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How narration is voiced for a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpeechMode {
  /// Text only.
  #[default]
  Off,
  /// Text plus a spoken rendition.
  On,
  /// Spoken rendition instead of text.
  AudioOnly,
  /// Same delivery as `On`; kept as a separate mode for voice-call toggles.
  VoiceCall,
}

impl SpeechMode {
  pub fn speaks(self) -> bool {
    !matches!(self, SpeechMode::Off)
  }

  /// Parse a mode, coercing anything unrecognised to `Off`.
  pub fn parse_or_off(value: &str) -> Self {
    value.parse().unwrap_or_default()
  }
}

impl fmt::Display for SpeechMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      SpeechMode::Off => "off",
      SpeechMode::On => "on",
      SpeechMode::AudioOnly => "audio-only",
      SpeechMode::VoiceCall => "voice-call",
    };
    f.write_str(name)
  }
}

impl FromStr for SpeechMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "off" => Ok(SpeechMode::Off),
      "on" => Ok(SpeechMode::On),
      "audio-only" | "audio_only" => Ok(SpeechMode::AudioOnly),
      "voice-call" | "voice_call" => Ok(SpeechMode::VoiceCall),
      other => Err(format!("unknown speech mode: {other}")),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::SpeechMode;

  #[test]
  fn unknown_modes_fall_back_to_off() {
    assert_eq!(SpeechMode::parse_or_off("AUDIO-ONLY"), SpeechMode::AudioOnly);
    assert_eq!(SpeechMode::parse_or_off("loud"), SpeechMode::Off);
    assert!("loud".parse::<SpeechMode>().is_err());
  }

  #[test]
  fn display_round_trips_through_from_str() {
    for mode in [
      SpeechMode::Off,
      SpeechMode::On,
      SpeechMode::AudioOnly,
      SpeechMode::VoiceCall,
    ] {
      assert_eq!(mode.to_string().parse::<SpeechMode>(), Ok(mode));
    }
    assert!(!SpeechMode::Off.speaks());
    assert!(SpeechMode::VoiceCall.speaks());
  }
}
