// Parsing
// Reasoning masking, invocation scanning, segmentation and canonicalization.
// Everything here is synchronous and free of shared state.

pub mod canonical;
pub mod format;
pub mod masker;
pub mod scanner;
pub mod segment;

pub use canonical::{CanonicalLine, canonicalize};
pub use format::{format_invocation, strip_reasoning, strip_speaker_prefix};
pub use masker::{mask, reasoning_spans};
pub use scanner::scan;
pub use segment::segment;
