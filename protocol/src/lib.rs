// Weave Protocol Layer
// Data model shared by the engine, the transports and the CLI

pub mod capability;
pub mod output;
pub mod segment;
pub mod speech;

mod base64_bytes;

pub use capability::{CapabilityRequest, CapabilityResult, FailureKind, MediaPayload};
pub use output::OutputUnit;
pub use segment::{Invocation, Segment, reconstruct};
pub use speech::SpeechMode;
