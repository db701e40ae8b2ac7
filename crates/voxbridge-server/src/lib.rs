//! WebSocket surface for the voxbridge server.
//!
//! Clients stream PCM audio and commands in as JSON; transcriptions, status
//! and error payloads flow back out. The core consumes this crate through
//! three seams: [`Broadcaster`] for fan-out, [`AudioSink`] for inbound audio
//! and [`CommandDispatcher`] for control commands.

pub mod protocol;
pub mod traits;
pub mod ws;

pub use protocol::{InboundMessage, OutboundMessage};
pub use traits::{AudioSink, Broadcaster, CommandDispatcher};
pub use ws::{ServerHandle, TranscriptionServer};
