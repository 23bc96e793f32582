//! Camera frame acquisition.
//!
//! The crate owns the camera device handle and hands out one frame at a
//! time through the [`FrameSource`] capability, so consumers can poll a
//! real [`CameraSource`] in production and a scripted fake in tests.

mod camera;
mod types;

pub use camera::CameraSource;
pub use types::{CaptureError, Frame, FrameFormat, FrameSource};
