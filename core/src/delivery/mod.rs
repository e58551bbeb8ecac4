// Delivery
// Assembling output units and handing them to a transport

pub mod assembler;
pub mod transport;

pub use assembler::{Assembly, AssemblyItem, DeliveryAssembler, split_text};
pub use transport::{Deliverable, DeliveryError, MemoryTransport};
