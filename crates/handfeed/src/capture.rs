//! Capture loop feeding the shared landmark state.
//!
//! One background thread owns the camera handle, polls frames as fast as
//! the device delivers them, runs the hand landmark model, and publishes
//! the first detected hand of every frame into the shared cell. Frames
//! without a hand leave the previous landmarks in place.

use std::{io, thread, time::Instant};

use hand_model::{tch::Device, HandLandmarker, HandLandmarks};
use tracing::{debug, error};
use video_ingest::{CameraSource, Frame, FrameFormat, FrameSource};

use crate::{
    config::ServiceConfig,
    data::{points_from_hand, SharedHandState},
    telemetry,
};

/// Capability of turning a captured frame into per-hand landmark sets.
pub(crate) trait HandTracker {
    fn track(&mut self, frame: &Frame) -> anyhow::Result<Vec<HandLandmarks>>;
}

impl HandTracker for HandLandmarker {
    fn track(&mut self, frame: &Frame) -> anyhow::Result<Vec<HandLandmarks>> {
        if !matches!(frame.format, FrameFormat::Bgr8) {
            anyhow::bail!("unsupported frame format");
        }
        self.detect_bgr(&frame.data, frame.width, frame.height)
    }
}

/// Spawn the background capture thread.
///
/// Model-load and device-open failures are logged and terminate the thread
/// without touching the shared state; the endpoint keeps serving whatever
/// the cell holds.
pub(crate) fn spawn_capture_loop(
    config: ServiceConfig,
    shared: SharedHandState,
) -> io::Result<thread::JoinHandle<()>> {
    telemetry::spawn_thread("handfeed-capture", move || {
        let device = if config.use_cpu {
            Device::Cpu
        } else {
            Device::cuda_if_available()
        };

        let landmarker = match HandLandmarker::new(
            &config.model_path,
            device,
            (config.width as i64, config.height as i64),
        ) {
            Ok(landmarker) => {
                landmarker.with_confidence(config.detection_confidence, config.tracking_confidence)
            }
            Err(err) => {
                error!("Failed to load hand landmark model: {err:?}");
                return;
            }
        };
        debug!("Hand landmark model loaded on {:?}", landmarker.device());

        let source = match CameraSource::open(config.camera_index, (config.width, config.height)) {
            Ok(source) => source,
            Err(err) => {
                error!("Could not open camera #{}: {err}", config.camera_index);
                return;
            }
        };

        run_loop(source, landmarker, &shared);
    })
}

/// Poll `source` until it fails hard, publishing the first detected hand of
/// every frame into `shared`. Transient read misses are retried immediately
/// with no backoff.
fn run_loop<S, T>(mut source: S, mut tracker: T, shared: &SharedHandState)
where
    S: FrameSource,
    T: HandTracker,
{
    let mut frame_number: u64 = 0;
    let mut smoothed_fps: f32 = 0.0;
    let mut last_instant = Instant::now();

    loop {
        let frame = match source.grab() {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(err) => {
                error!("Camera read failed: {err}");
                break;
            }
        };

        frame_number = frame_number.wrapping_add(1);
        metrics::counter!("handfeed_frames_total").increment(1);

        let now = Instant::now();
        let elapsed = now.duration_since(last_instant).as_secs_f32();
        last_instant = now;
        if elapsed > 0.0 {
            let instant = 1.0 / elapsed;
            smoothed_fps = if smoothed_fps == 0.0 {
                instant
            } else {
                0.9 * smoothed_fps + 0.1 * instant
            };
            metrics::gauge!("handfeed_capture_fps").set(smoothed_fps as f64);
        }
        if frame_number % 30 == 0 {
            debug!(
                "Capture heartbeat: frame #{}, {:.1} fps, ts={}",
                frame_number, smoothed_fps, frame.timestamp_ms
            );
        }

        let hands = match tracker.track(&frame) {
            Ok(hands) => hands,
            Err(err) => {
                error!("Hand landmark inference failed: {err:?}");
                break;
            }
        };

        match hands.first() {
            Some(hand) => {
                debug!("Hand landmarks detected (score {:.2})", hand.score);
                metrics::counter!("handfeed_detections_total").increment(1);
                let points = points_from_hand(hand);
                let mut guard = shared
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *guard = points;
            }
            None => {
                debug!("No hands detected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use anyhow::anyhow;
    use hand_model::{HandLandmarks, Landmark, HAND_LANDMARK_COUNT};
    use video_ingest::{CaptureError, Frame, FrameFormat};

    use super::*;
    use crate::data::LandmarkPoint;

    enum SourceStep {
        Frame,
        Miss,
    }

    /// Yields the scripted steps, then fails hard to end the loop.
    struct ScriptedSource {
        steps: VecDeque<SourceStep>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<SourceStep>) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn grab(&mut self) -> Result<Option<Frame>, CaptureError> {
            match self.steps.pop_front() {
                Some(SourceStep::Frame) => Ok(Some(test_frame())),
                Some(SourceStep::Miss) => Ok(None),
                None => Err(CaptureError::Other(anyhow!("source exhausted"))),
            }
        }
    }

    /// Returns one scripted detection result per tracked frame.
    struct ScriptedTracker {
        results: VecDeque<Vec<HandLandmarks>>,
    }

    impl ScriptedTracker {
        fn new(results: Vec<Vec<HandLandmarks>>) -> Self {
            Self {
                results: results.into(),
            }
        }
    }

    impl HandTracker for ScriptedTracker {
        fn track(&mut self, _frame: &Frame) -> anyhow::Result<Vec<HandLandmarks>> {
            Ok(self.results.pop_front().unwrap_or_default())
        }
    }

    fn test_frame() -> Frame {
        Frame {
            data: vec![0; 4 * 4 * 3],
            width: 4,
            height: 4,
            timestamp_ms: 0,
            format: FrameFormat::Bgr8,
        }
    }

    fn hand(x: f32) -> HandLandmarks {
        HandLandmarks {
            points: (0..HAND_LANDMARK_COUNT)
                .map(|i| Landmark {
                    x,
                    y: i as f32,
                    z: 0.0,
                })
                .collect(),
            score: 0.9,
        }
    }

    fn empty_state() -> SharedHandState {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn snapshot(shared: &SharedHandState) -> Vec<LandmarkPoint> {
        shared.lock().unwrap().clone()
    }

    #[test]
    fn detection_replaces_shared_state() {
        let shared = empty_state();
        let source = ScriptedSource::new(vec![SourceStep::Frame]);
        let tracker = ScriptedTracker::new(vec![vec![hand(0.5)]]);

        run_loop(source, tracker, &shared);

        let points = snapshot(&shared);
        assert_eq!(points.len(), HAND_LANDMARK_COUNT);
        assert_eq!(points[0], LandmarkPoint { x: 0.5, y: 0.0, z: 0.0 });
        assert_eq!(points[20].y, 20.0);
    }

    #[test]
    fn empty_frames_keep_the_last_detection() {
        let shared = empty_state();
        let source = ScriptedSource::new(vec![SourceStep::Frame, SourceStep::Frame]);
        let tracker = ScriptedTracker::new(vec![vec![hand(1.0)], vec![]]);

        run_loop(source, tracker, &shared);

        let points = snapshot(&shared);
        assert_eq!(points.len(), HAND_LANDMARK_COUNT);
        assert_eq!(points[0].x, 1.0);
    }

    #[test]
    fn only_the_first_hand_is_kept() {
        let shared = empty_state();
        let source = ScriptedSource::new(vec![SourceStep::Frame]);
        let tracker = ScriptedTracker::new(vec![vec![hand(1.0), hand(2.0)]]);

        run_loop(source, tracker, &shared);

        let points = snapshot(&shared);
        assert_eq!(points.len(), HAND_LANDMARK_COUNT);
        assert!(points.iter().all(|p| p.x == 1.0));
    }

    #[test]
    fn read_misses_are_skipped_without_consuming_detections() {
        let shared = empty_state();
        let source = ScriptedSource::new(vec![SourceStep::Miss, SourceStep::Miss, SourceStep::Frame]);
        let tracker = ScriptedTracker::new(vec![vec![hand(3.0)]]);

        run_loop(source, tracker, &shared);

        assert_eq!(snapshot(&shared)[0].x, 3.0);
    }

    #[test]
    fn failed_source_never_touches_state() {
        let shared = empty_state();
        let source = ScriptedSource::new(vec![]);
        let tracker = ScriptedTracker::new(vec![]);

        run_loop(source, tracker, &shared);

        assert!(snapshot(&shared).is_empty());
    }

    #[test]
    fn readers_never_observe_a_mixed_frame() {
        let shared = empty_state();
        let frames = 200;
        let source = ScriptedSource::new((0..frames).map(|_| SourceStep::Frame).collect());
        let tracker = ScriptedTracker::new(
            (0..frames)
                .map(|i| vec![hand(if i % 2 == 0 { 1.0 } else { 2.0 })])
                .collect(),
        );

        let writer_shared = shared.clone();
        let writer = thread::spawn(move || run_loop(source, tracker, &writer_shared));

        while !writer.is_finished() {
            let points = snapshot(&shared);
            if points.is_empty() {
                continue;
            }
            assert_eq!(points.len(), HAND_LANDMARK_COUNT);
            let x = points[0].x;
            assert!(points.iter().all(|p| p.x == x), "mixed frame observed");
        }
        writer.join().unwrap();
    }
}
