use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use weave_protocol::OutputUnit;

/// Transport failures
#[derive(Error, Debug)]
pub enum DeliveryError {
  /// The channel went away
  #[error("Transport closed")]
  Closed,

  #[error("Transport error: {0}")]
  Transport(String),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

/// Destination for output units (chat channel, stdout, a test buffer).
#[async_trait]
pub trait Deliverable: Send + Sync {
  /// Deliver one unit. Called once per unit, in order.
  async fn deliver(&self, unit: OutputUnit) -> Result<(), DeliveryError>;

  /// Signal that work is in progress. Best effort.
  async fn typing(&self) {}
}

/// Keeps every delivered unit in memory.
#[derive(Debug, Default)]
pub struct MemoryTransport {
  units: Mutex<Vec<OutputUnit>>,
  typing_signals: Mutex<usize>,
}

impl MemoryTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn units(&self) -> Vec<OutputUnit> {
    self.units.lock().await.clone()
  }

  pub async fn typing_signals(&self) -> usize {
    *self.typing_signals.lock().await
  }
}

#[async_trait]
impl Deliverable for MemoryTransport {
  async fn deliver(&self, unit: OutputUnit) -> Result<(), DeliveryError> {
    self.units.lock().await.push(unit);
    Ok(())
  }

  async fn typing(&self) {
    *self.typing_signals.lock().await += 1;
  }
}
