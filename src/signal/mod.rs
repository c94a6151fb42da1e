//! Signal Bridge Module
//! Mission: Render external trading events into room messages

pub mod ingest;
pub mod render;

pub use ingest::{SignalError, SignalIngestor, SignalReceipt};
pub use render::{render_signal, resolve_exit_direction, Direction};
