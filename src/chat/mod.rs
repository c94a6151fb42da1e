//! Real-Time Chat Module
//! Mission: Room-scoped messaging with durability-before-delivery

pub mod message_store;
pub mod pipeline;
pub mod presence;
pub mod protocol;
pub mod registry;
pub mod socket;

pub use message_store::MessageStore;
pub use pipeline::{ChatError, MessagePipeline};
pub use presence::{PresenceEntry, PresenceTracker};
pub use protocol::{ClientFrame, MessageFrame, ServerFrame};
pub use registry::{Connection, ConnectionRegistry, Outbound};
