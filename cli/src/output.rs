// Console transport
// Prints text units and writes media units to disk

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::{debug, error};
use weave_core::delivery::{Deliverable, DeliveryError};
use weave_protocol::{CapabilityResult, MediaPayload, OutputUnit};

/// Delivers units to a text sink, one block per unit separated by a blank
/// line. Media goes to `out_dir` and only its path is printed.
pub struct ConsoleTransport<W> {
  out_dir: PathBuf,
  writer: Mutex<W>,
  media_written: AtomicUsize,
}

impl<W: Write + Send> ConsoleTransport<W> {
  pub fn new(out_dir: PathBuf, writer: W) -> Self {
    Self {
      out_dir,
      writer: Mutex::new(writer),
      media_written: AtomicUsize::new(0),
    }
  }

  pub fn into_writer(self) -> W {
    self
      .writer
      .into_inner()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn print(&self, block: &str) -> Result<(), DeliveryError> {
    let mut writer = self
      .writer
      .lock()
      .map_err(|_| DeliveryError::Transport("output writer poisoned".to_string()))?;
    writeln!(writer, "{block}\n")?;
    writer.flush()?;
    Ok(())
  }

  async fn save(&self, payload: &MediaPayload) -> Result<PathBuf, DeliveryError> {
    let n = self.media_written.fetch_add(1, Ordering::SeqCst) + 1;
    let name = match payload.file_name.as_deref() {
      Some(name) => format!("{n:02}_{}", file_name_only(name)),
      None => format!("{n:02}_weave.{}", payload.extension()),
    };
    tokio::fs::create_dir_all(&self.out_dir).await?;
    let path = self.out_dir.join(name);
    tokio::fs::write(&path, &payload.bytes).await?;
    debug!(path = %path.display(), bytes = payload.bytes.len(), "Wrote media unit");
    Ok(path)
  }
}

#[async_trait]
impl<W: Write + Send> Deliverable for ConsoleTransport<W> {
  async fn deliver(&self, unit: OutputUnit) -> Result<(), DeliveryError> {
    match unit {
      OutputUnit::Narration { text } => self.print(&text),
      OutputUnit::Result { command, result } => match result {
        CapabilityResult::Text { content } => self.print(&content),
        CapabilityResult::Media(payload) => {
          let path = self.save(&payload).await?;
          self.print(&format!("[media] {} ({})", path.display(), payload.mime_type))
        }
        CapabilityResult::Failure { kind, reason } => {
          error!(%command, ?kind, %reason, "Tool call failed");
          self.print(&format!("[{command}] failed: {reason}"))
        }
      },
    }
  }

  async fn typing(&self) {
    debug!("Running tool calls");
  }
}

// Provider-supplied names never escape the output directory.
fn file_name_only(name: &str) -> &str {
  Path::new(name)
    .file_name()
    .and_then(|n| n.to_str())
    .unwrap_or("media.bin")
}
