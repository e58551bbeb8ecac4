// Weave Core Library

pub mod delivery;
pub mod dispatch;
pub mod parse;
pub mod pipeline;
pub mod providers;
pub mod state;

pub use pipeline::{Pipeline, PipelineError, PipelineReport, RenderedReply};
pub use state::ConversationState;
