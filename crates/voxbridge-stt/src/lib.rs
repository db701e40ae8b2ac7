//! Speech-to-text engine facade for the voxbridge pipeline.
//!
//! The rest of the system talks to the recognizer through the
//! [`SpeechEngine`] trait and parses only the JSON shapes this crate
//! produces: `{"partial": "<text>"}` for tentative hypotheses and
//! `{"text": "<text>", ...}` for sealed utterances.

pub mod engine;
pub mod types;

pub use engine::VoskEngine;
pub use types::{EngineError, SpeechEngine, SpeechEngineConfig};
