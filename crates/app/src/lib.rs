//! Application core for the voxbridge speech-recognition server: the
//! per-chunk audio processing pipeline and the glue that wires capture, VAD,
//! the speech engine, the WebSocket surface and the benchmark together.

pub mod cli;
pub mod glue;
pub mod logging;
pub mod processor;

pub use cli::Args;
pub use glue::{AppConfig, AppCore};
pub use processor::{AudioProcessor, ProcessorConfig};
