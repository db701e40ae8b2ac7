//! Microphone capture for the voxbridge pipeline.
//!
//! The hardware callback runs on a real-time driver thread and must never
//! block: it accumulates samples into fixed-duration chunks and hands them
//! to a bounded lock-free SPSC queue. A consumer thread delivers the chunks
//! downstream at its own pace.

pub mod capture;
pub mod chunk_queue;
pub mod device;

pub use capture::{MicCapture, MicCaptureConfig};
pub use chunk_queue::{ChunkConsumer, ChunkProducer, ChunkQueue, ChunkSignal};
pub use device::{enumerate_input_devices, print_input_devices, resolve_input_device, DeviceInfo};
