use anyhow::Error;
use thiserror::Error;

/// Raw BGR frame captured from a camera device.
pub struct Frame {
    pub data: Vec<u8>,
    pub width: i32,
    pub height: i32,
    pub timestamp_ms: i64,
    pub format: FrameFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    Bgr8,
}

impl FrameFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            FrameFormat::Bgr8 => 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open camera device #{index}")]
    Open { index: i32 },
    #[error(transparent)]
    Other(#[from] Error),
}

/// Capability of producing frames one at a time.
///
/// `Ok(None)` signals a transient read miss: the caller skips the iteration
/// and polls again immediately. `Err` means the device layer itself failed
/// and no further frames will arrive.
pub trait FrameSource {
    fn grab(&mut self) -> Result<Option<Frame>, CaptureError>;
}
