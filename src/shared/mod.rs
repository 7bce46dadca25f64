//! Cross-cutting building blocks shared by every layer.

pub mod cache;
pub mod errors;
pub mod ocpp_frame;
pub mod shutdown;

pub use cache::{ComputeOnceCache, ReadOnceMap};
pub use errors::*;
pub use ocpp_frame::{OcppFrame, OcppFrameError};
pub use shutdown::*;
