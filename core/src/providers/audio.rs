//! Audio splitting
//!
//! Cuts generated audio into parts that each fit one upload and still play
//! on their own: WAV parts get their own RIFF header, MP3 parts start on a
//! frame sync, FLAC parts repeat the stream metadata and start on a frame
//! header.

use tracing::warn;
use weave_config::AudioFormat;

use crate::dispatch::context::{ProviderError, Result};

/// Split `audio` into playable parts of at most `limit` bytes.
pub fn split_audio(audio: &[u8], format: AudioFormat, limit: usize) -> Result<Vec<Vec<u8>>> {
  if audio.len() <= limit {
    return Ok(vec![audio.to_vec()]);
  }
  match format {
    AudioFormat::Wav => split_wav(audio, limit),
    AudioFormat::Mp3 => Ok(split_at_frames(audio, limit, &[], is_mp3_frame)),
    AudioFormat::Flac => split_flac(audio, limit),
  }
}

// ============================================================================
// WAV
// ============================================================================

struct WavLayout<'a> {
  fmt: &'a [u8],
  data: &'a [u8],
  block_align: usize,
}

fn split_wav(audio: &[u8], limit: usize) -> Result<Vec<Vec<u8>>> {
  let wav = parse_wav(audio).ok_or_else(|| {
    ProviderError::InvalidResponse("generated WAV has no fmt/data chunks".to_string())
  })?;

  // RIFF/WAVE + fmt chunk + data chunk header, and one byte of padding slack
  let header_len = 12 + 8 + wav.fmt.len() + (wav.fmt.len() & 1) + 8 + 1;
  let capacity = limit.saturating_sub(header_len) / wav.block_align * wav.block_align;
  if capacity == 0 {
    return Err(ProviderError::InvalidResponse(format!(
      "upload limit of {limit} bytes cannot hold a WAV frame"
    )));
  }

  Ok(
    wav
      .data
      .chunks(capacity)
      .map(|chunk| wav_part(wav.fmt, chunk))
      .collect(),
  )
}

fn parse_wav(audio: &[u8]) -> Option<WavLayout<'_>> {
  if audio.get(..4)? != b"RIFF" || audio.get(8..12)? != b"WAVE" {
    return None;
  }

  let mut fmt = None;
  let mut pos = 12;
  while pos + 8 <= audio.len() {
    let id = &audio[pos..pos + 4];
    let size = u32::from_le_bytes(audio[pos + 4..pos + 8].try_into().ok()?) as usize;
    let body = pos + 8;

    if id == b"data" {
      let fmt: &[u8] = fmt?;
      let block_align = u16::from_le_bytes(fmt.get(12..14)?.try_into().ok()?) as usize;
      // Streaming writers may leave the data size unset
      let end = body.saturating_add(size).min(audio.len());
      return Some(WavLayout {
        fmt,
        data: &audio[body..end],
        block_align: block_align.max(1),
      });
    }
    if id == b"fmt " {
      fmt = Some(audio.get(body..body + size)?);
    }
    pos = body + size + (size & 1);
  }
  None
}

fn wav_part(fmt: &[u8], data: &[u8]) -> Vec<u8> {
  let fmt_pad = fmt.len() & 1;
  let data_pad = data.len() & 1;
  let riff_len = 4 + 8 + fmt.len() + fmt_pad + 8 + data.len() + data_pad;

  let mut out = Vec::with_capacity(8 + riff_len);
  out.extend_from_slice(b"RIFF");
  out.extend_from_slice(&(riff_len as u32).to_le_bytes());
  out.extend_from_slice(b"WAVE");
  out.extend_from_slice(b"fmt ");
  out.extend_from_slice(&(fmt.len() as u32).to_le_bytes());
  out.extend_from_slice(fmt);
  out.resize(out.len() + fmt_pad, 0);
  out.extend_from_slice(b"data");
  out.extend_from_slice(&(data.len() as u32).to_le_bytes());
  out.extend_from_slice(data);
  out.resize(out.len() + data_pad, 0);
  out
}

// ============================================================================
// FRAMED FORMATS
// ============================================================================

/// Cut `body` just before a frame header so that no part exceeds
/// `capacity` bytes. `prefix` is prepended to every part.
fn split_at_frames(
  body: &[u8],
  capacity: usize,
  prefix: &[u8],
  is_frame: fn(&[u8]) -> bool,
) -> Vec<Vec<u8>> {
  let mut parts = Vec::new();
  let mut start = 0;
  while start < body.len() {
    let hard_end = (start + capacity).min(body.len());
    let end = if hard_end == body.len() {
      hard_end
    } else {
      (start + 1..=hard_end)
        .rev()
        .find(|&i| is_frame(&body[i..]))
        .unwrap_or_else(|| {
          warn!(offset = hard_end, "No frame boundary in range, cutting mid-frame");
          hard_end
        })
    };

    let mut part = Vec::with_capacity(prefix.len() + end - start);
    part.extend_from_slice(prefix);
    part.extend_from_slice(&body[start..end]);
    parts.push(part);
    start = end;
  }
  parts
}

fn is_mp3_frame(bytes: &[u8]) -> bool {
  let &[sync, flags, rates, ..] = bytes else {
    return false;
  };
  sync == 0xFF
    && flags & 0xE0 == 0xE0
    && (flags >> 3) & 0b11 != 0b01
    && (flags >> 1) & 0b11 != 0
    && rates >> 4 != 0x0F
    && (rates >> 2) & 0b11 != 0b11
}

fn split_flac(audio: &[u8], limit: usize) -> Result<Vec<Vec<u8>>> {
  let audio_start = flac_audio_start(audio).ok_or_else(|| {
    ProviderError::InvalidResponse("generated FLAC has no stream metadata".to_string())
  })?;

  let mut header = audio[..audio_start].to_vec();
  clear_stream_totals(&mut header);
  let capacity = limit.saturating_sub(header.len());
  if capacity == 0 {
    return Err(ProviderError::InvalidResponse(format!(
      "upload limit of {limit} bytes cannot hold the FLAC metadata"
    )));
  }

  Ok(split_at_frames(
    &audio[audio_start..],
    capacity,
    &header,
    is_flac_frame,
  ))
}

/// Offset of the first audio frame, after the last metadata block.
fn flac_audio_start(audio: &[u8]) -> Option<usize> {
  if audio.get(..4)? != b"fLaC" {
    return None;
  }
  let mut pos = 4;
  loop {
    let block = audio.get(pos..pos + 4)?;
    let last = block[0] & 0x80 != 0;
    let len = u32::from_be_bytes([0, block[1], block[2], block[3]]) as usize;
    pos += 4 + len;
    if pos > audio.len() {
      return None;
    }
    if last {
      return Some(pos);
    }
  }
}

/// Zero the total sample count and MD5 in STREAMINFO; a part only holds
/// some of the frames, and zero means "unknown" to decoders.
fn clear_stream_totals(header: &mut [u8]) {
  const INFO: usize = 8;
  if header.len() < INFO + 34 || header[4] & 0x7F != 0 {
    return;
  }
  header[INFO + 13] &= 0xF0;
  header[INFO + 14..INFO + 34].fill(0);
}

fn is_flac_frame(bytes: &[u8]) -> bool {
  let &[sync, flags, sizes, layout, ..] = bytes else {
    return false;
  };
  if sync != 0xFF || flags & 0xFE != 0xF8 {
    return false;
  }
  let block_code = sizes >> 4;
  let rate_code = sizes & 0x0F;
  if block_code == 0 || rate_code == 0x0F || layout >> 4 > 10 || (layout >> 1) & 0b111 == 0b011 {
    return false;
  }
  if layout & 0x01 != 0 {
    return false;
  }

  let Some(coded) = bytes.get(4).and_then(|lead| coded_number_len(*lead)) else {
    return false;
  };
  let mut len = 4 + coded;
  len += match block_code {
    6 => 1,
    7 => 2,
    _ => 0,
  };
  len += match rate_code {
    12 => 1,
    13 | 14 => 2,
    _ => 0,
  };
  bytes
    .get(len)
    .is_some_and(|crc| bytes.get(..len).is_some_and(|head| crc8(head) == *crc))
}

/// Length of the UTF-8 style frame/sample number starting with `lead`.
fn coded_number_len(lead: u8) -> Option<usize> {
  match lead.leading_ones() {
    0 => Some(1),
    n @ 2..=7 => Some(n as usize),
    _ => None,
  }
}

/// CRC-8, polynomial x^8 + x^2 + x + 1, as used by FLAC frame headers.
fn crc8(bytes: &[u8]) -> u8 {
  bytes.iter().fold(0u8, |crc, &byte| {
    (0..8).fold(crc ^ byte, |c, _| {
      if c & 0x80 != 0 { (c << 1) ^ 0x07 } else { c << 1 }
    })
  })
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  /// Mono 16-bit PCM at 8 kHz.
  fn wav(data: &[u8]) -> Vec<u8> {
    let mut fmt = Vec::new();
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&8_000u32.to_le_bytes());
    fmt.extend_from_slice(&16_000u32.to_le_bytes());
    fmt.extend_from_slice(&2u16.to_le_bytes());
    fmt.extend_from_slice(&16u16.to_le_bytes());
    wav_part(&fmt, data)
  }

  fn flac_frame(number: u8) -> Vec<u8> {
    let mut frame = vec![0xFF, 0xF8, 0x19, 0x08, number];
    frame.push(crc8(&frame));
    frame.extend_from_slice(&[0; 6]);
    frame
  }

  #[test]
  fn audio_within_limit_is_untouched() {
    let audio = wav(&[1, 2, 3, 4]);
    assert_eq!(
      split_audio(&audio, AudioFormat::Wav, audio.len()).expect("split"),
      vec![audio]
    );
  }

  #[test]
  fn every_wav_part_carries_its_own_header() {
    let data: Vec<u8> = (0..100).collect();
    let parts = split_audio(&wav(&data), AudioFormat::Wav, 64).expect("split");

    assert_eq!(parts.len(), 6);
    let mut joined = Vec::new();
    for part in &parts {
      assert!(part.len() <= 64);
      let layout = parse_wav(part).expect("part is a WAV file");
      assert_eq!(layout.block_align, 2);
      assert_eq!(layout.data.len() % 2, 0);
      joined.extend_from_slice(layout.data);
    }
    assert_eq!(joined, data);

    let second = &parts[1];
    assert_eq!(&second[..4], b"RIFF");
    assert_eq!(&second[8..12], b"WAVE");
    assert_eq!(
      u32::from_le_bytes([second[4], second[5], second[6], second[7]]) as usize,
      second.len() - 8
    );
  }

  #[test]
  fn wav_without_chunks_is_rejected() {
    let err = split_audio(&[0; 80], AudioFormat::Wav, 40).expect_err("not a WAV");
    assert!(matches!(err, ProviderError::InvalidResponse(_)));
  }

  #[test]
  fn mp3_parts_start_on_frame_sync() {
    let frame = [0xFF, 0xFB, 0x90, 0x00, 0, 0, 0, 0, 0, 0];
    let audio = frame.repeat(5);

    let parts = split_audio(&audio, AudioFormat::Mp3, 25).expect("split");
    assert_eq!(
      parts.iter().map(Vec::len).collect::<Vec<_>>(),
      vec![20, 20, 10]
    );
    assert!(parts.iter().all(|p| p[..2] == [0xFF, 0xFB]));
    assert_eq!(parts.concat(), audio);
  }

  #[test]
  fn flac_parts_repeat_metadata_and_start_on_frames() {
    let mut audio = b"fLaC".to_vec();
    audio.extend_from_slice(&[0x80, 0, 0, 34]);
    audio.extend_from_slice(&[0xAA; 34]);
    let header_len = audio.len();
    for n in 0..4 {
      audio.extend(flac_frame(n));
    }

    let parts = split_audio(&audio, AudioFormat::Flac, header_len + 25).expect("split");
    assert_eq!(parts.len(), 2);
    for part in &parts {
      assert_eq!(&part[..4], b"fLaC");
      assert_eq!(part[8 + 13] & 0x0F, 0);
      assert!(part[8 + 14..8 + 34].iter().all(|b| *b == 0));
      assert_eq!(part[header_len..header_len + 2], [0xFF, 0xF8]);
      assert!(is_flac_frame(&part[header_len..]));
    }
    assert_eq!(parts[1][header_len + 4], 2);
  }

  #[test]
  fn flac_frame_check_uses_header_crc() {
    assert_eq!(crc8(b"123456789"), 0xF4);
    let mut frame = flac_frame(7);
    assert!(is_flac_frame(&frame));
    frame[5] ^= 0x01;
    assert!(!is_flac_frame(&frame));
  }
}
