//! Object detection capability.
//!
//! The pipeline treats detection as an opaque, possibly fallible black box
//! behind the [`Detector`] trait; any backend can be injected. An ONNX
//! Runtime implementation ships behind the `onnx` cargo feature.

#[cfg(feature = "onnx")]
mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::{OnnxDetector, OnnxDetectorConfig, MATCH_CLASSES};

use image::RgbImage;
use pitchvision_models::Detection;

use crate::error::PipelineResult;

/// Capability for finding labeled, scored objects in a single frame.
pub trait Detector: Send + Sync {
    /// Detect objects in one frame.
    ///
    /// Bounding boxes are in pixel coordinates of the given frame. A failure
    /// here is isolated per frame by the orchestrator.
    fn detect(&self, frame: &RgbImage) -> PipelineResult<Vec<Detection>>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}
