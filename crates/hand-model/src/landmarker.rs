use std::path::Path;

use anyhow::Result;
use tch::{self, Device, Kind, Tensor};

/// Number of keypoints the model predicts per hand.
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Values per candidate row: 21 landmarks x (x, y, z) plus a presence score.
const VALUES_PER_HAND: usize = HAND_LANDMARK_COUNT * 3 + 1;

/// Single keypoint in the model's normalized coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// One hand's ordered landmark sequence with the model's presence score.
///
/// Point order is anatomical (wrist first, fingers in model order) and is
/// preserved exactly as the model emitted it.
#[derive(Debug, Clone, Default)]
pub struct HandLandmarks {
    pub points: Vec<Landmark>,
    pub score: f32,
}

/// TorchScript-backed hand landmark model wrapper.
pub struct HandLandmarker {
    module: tch::CModule,
    device: Device,
    input_size: (i64, i64),
    detection_confidence: f32,
    tracking_confidence: f32,
    tracked: bool,
}

impl HandLandmarker {
    /// Load a TorchScript module and prepare it for execution on `device`.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        device: Device,
        input_size: (i64, i64),
    ) -> Result<Self> {
        let module = tch::CModule::load_on_device(model_path, device)?;
        Ok(Self {
            module,
            device,
            input_size,
            detection_confidence: 0.5,
            tracking_confidence: 0.5,
            tracked: false,
        })
    }

    /// Override the confidence thresholds used to accept hand candidates.
    ///
    /// `detection` gates fresh detections; the (usually lower) `tracking`
    /// threshold applies while a hand was present on the previous frame.
    pub fn with_confidence(mut self, detection: f32, tracking: f32) -> Self {
        self.detection_confidence = detection;
        self.tracking_confidence = tracking;
        self
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Converts a BGR frame into the normalized RGB tensor the model expects.
    pub fn bgr_to_tensor(&self, bgr: &[u8], width: i32, height: i32) -> Result<Tensor> {
        let expected = (width as usize) * (height as usize) * 3;
        if bgr.len() != expected {
            anyhow::bail!(
                "unexpected frame buffer size: got {} bytes, expected {}",
                bgr.len(),
                expected
            );
        }

        let (in_w, in_h) = self.input_size;
        if (width as i64, height as i64) != (in_w, in_h) {
            anyhow::bail!("frame size {width}x{height} does not match model input {in_w}x{in_h}");
        }

        // The model was trained on RGB input; flip the channel axis.
        let tensor = Tensor::from_slice(bgr)
            .to_device(self.device)
            .to_kind(Kind::Float)
            .view([1, in_h, in_w, 3])
            .flip([3])
            .permute([0, 3, 1, 2])
            / 255.0;

        Ok(tensor)
    }

    /// Executes the module and returns the accepted hands in model order.
    pub fn infer(&mut self, input: &Tensor) -> Result<Vec<HandLandmarks>> {
        let output = self.module.forward_ts(&[input])?;
        let shape = output.size();
        if shape.len() != 2 {
            anyhow::bail!("unexpected model output shape: {shape:?}");
        }
        if shape[1] != VALUES_PER_HAND as i64 {
            anyhow::bail!(
                "model output requires {VALUES_PER_HAND} values per hand candidate, got {}",
                shape[1]
            );
        }

        let flat = output
            .to_device(Device::Cpu)
            .to_kind(Kind::Float)
            .reshape([-1]);
        let values = Vec::<f32>::try_from(&flat)?;

        let threshold = effective_threshold(
            self.tracked,
            self.detection_confidence,
            self.tracking_confidence,
        );
        let hands = parse_candidates(&values, threshold);
        self.tracked = !hands.is_empty();
        Ok(hands)
    }

    /// Convenience path: tensor conversion plus inference in one call.
    pub fn detect_bgr(&mut self, bgr: &[u8], width: i32, height: i32) -> Result<Vec<HandLandmarks>> {
        let input = self.bgr_to_tensor(bgr, width, height)?;
        self.infer(&input)
    }
}

/// Threshold gating candidate acceptance. While a hand was present on the
/// previous frame the tracking threshold applies instead of the detection
/// threshold, so a briefly low-scoring hand is not dropped.
fn effective_threshold(tracked: bool, detection: f32, tracking: f32) -> f32 {
    if tracked {
        tracking
    } else {
        detection
    }
}

/// Split raw `[candidates x 64]` output values into scored landmark sets,
/// keeping candidates whose presence score reaches `threshold`. Row order
/// is preserved.
fn parse_candidates(values: &[f32], threshold: f32) -> Vec<HandLandmarks> {
    values
        .chunks_exact(VALUES_PER_HAND)
        .filter_map(|row| {
            let score = row[VALUES_PER_HAND - 1];
            if score < threshold {
                return None;
            }
            let points = row[..VALUES_PER_HAND - 1]
                .chunks_exact(3)
                .map(|p| Landmark {
                    x: p[0],
                    y: p[1],
                    z: p[2],
                })
                .collect();
            Some(HandLandmarks { points, score })
        })
        .collect()
}
