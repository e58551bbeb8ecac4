// Dispatch
// Capability providers, routing, retry and batch execution

pub mod context;
pub mod parallel;
pub mod registry;
pub mod retry;
pub mod router;

pub use context::{ProviderError, ProviderOutput};
pub use parallel::{BatchDispatcher, InvocationOutcome};
pub use registry::{CapabilityProvider, CapabilityRegistry};
pub use retry::RetryPolicy;
pub use router::{CapabilityRouter, Resolution};
