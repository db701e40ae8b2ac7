//! Shared foundation for the voxbridge pipeline: error taxonomy and
//! shutdown signalling.

pub mod error;
pub mod shutdown;

pub use error::{AppError, AudioError};
pub use shutdown::{ShutdownGuard, ShutdownHandler};
