use std::sync::{Arc, Mutex};

use hand_model::HandLandmarks;
use serde::Serialize;

/// Single landmark in the response payload.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub(crate) struct LandmarkPoint {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) z: f32,
}

/// Latest landmark set shared between the capture loop and HTTP handlers.
///
/// The `Vec` is replaced wholesale under the lock, so a reader observes
/// either the previous or the new frame's landmarks, never a mix. Empty
/// until the first frame with a detected hand.
pub(crate) type SharedHandState = Arc<Mutex<Vec<LandmarkPoint>>>;

/// JSON body served by `GET /hand_landmarks`.
#[derive(Serialize)]
pub(crate) struct LandmarksResponse<'a> {
    pub(crate) landmarks: &'a [LandmarkPoint],
}

/// Convert one hand's landmark sequence into response points, preserving
/// the model's anatomical order.
pub(crate) fn points_from_hand(hand: &HandLandmarks) -> Vec<LandmarkPoint> {
    hand.points
        .iter()
        .map(|p| LandmarkPoint {
            x: p.x,
            y: p.y,
            z: p.z,
        })
        .collect()
}
