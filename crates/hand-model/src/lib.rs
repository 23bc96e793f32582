//! Wrapper around the external TorchScript hand landmark model.
//!
//! The model contract, the fixed 21-point-per-hand layout, and the meaning
//! of the confidence thresholds all live here; callers only see ordered
//! landmark sequences.

pub mod landmarker;

pub use landmarker::{HandLandmarker, HandLandmarks, Landmark, HAND_LANDMARK_COUNT};

pub use tch;
