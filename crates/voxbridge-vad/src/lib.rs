//! Voice activity detection for the voxbridge pipeline.
//!
//! Two layers: [`FrameVad`] classifies fixed-size frames as speech or
//! non-speech, and [`HangoverVad`] smooths those per-frame decisions into a
//! stable SPEAKING signal with startup and hangover windows suitable for
//! utterance segmentation.

pub mod config;
pub mod engine;
pub mod hangover;

pub use config::{Aggressiveness, VadConfig, VadConfigError};
pub use engine::FrameVad;
pub use hangover::{HangoverConfig, HangoverVad, VadEngine};
