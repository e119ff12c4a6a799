//! Object detection using a YOLOv8-style ONNX model.
//!
//! Runs the match-trained detector (player, goalkeeper, ball, referees)
//! through ONNX Runtime with a CPU fallback. The implementation assumes the
//! standard YOLOv8 output layout `[1, 4 + C, N]`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use pitchvision_models::{BoundingBox, Detection};

use crate::detector::Detector;
use crate::error::{PipelineError, PipelineResult};

/// Class labels of the match detection model, in model output order.
pub const MATCH_CLASSES: &[&str] = &["player", "goalkeeper", "ball", "main referee", "side referee"];

/// Configuration for the ONNX detector.
#[derive(Debug, Clone)]
pub struct OnnxDetectorConfig {
    /// Path to the ONNX model file.
    pub model_path: PathBuf,
    /// Class labels in model output order.
    pub labels: Vec<String>,
    /// Minimum confidence for a candidate to survive decoding. Per-class
    /// thresholds are applied later by the annotator.
    pub confidence_floor: f32,
    /// IoU threshold for NMS.
    pub nms_threshold: f32,
    /// Model input size (square).
    pub input_size: u32,
}

impl Default for OnnxDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/match_detector.onnx"),
            labels: MATCH_CLASSES.iter().map(|s| s.to_string()).collect(),
            confidence_floor: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

/// ONNX Runtime backed detector.
pub struct OnnxDetector {
    session: Mutex<Session>,
    config: OnnxDetectorConfig,
}

impl OnnxDetector {
    /// Load the model and create a session.
    ///
    /// Fails with `ModelNotFound` when the model file is absent.
    pub fn new(config: OnnxDetectorConfig) -> PipelineResult<Self> {
        if !config.model_path.exists() {
            return Err(PipelineError::ModelNotFound(config.model_path.clone()));
        }
        if config.labels.is_empty() {
            return Err(PipelineError::internal("detector label table is empty"));
        }

        let session = Mutex::new(create_session(&config.model_path)?);
        info!(
            model_path = %config.model_path.display(),
            classes = config.labels.len(),
            input_size = config.input_size,
            "ONNX detector initialized"
        );

        Ok(Self { session, config })
    }

    /// Preprocess a frame for inference.
    ///
    /// Resize to the square input size, normalize to [0, 1], NCHW layout.
    fn preprocess(&self, frame: &RgbImage) -> PipelineResult<Value> {
        let input_size = self.config.input_size;
        let resized = DynamicImage::ImageRgb8(frame.clone())
            .resize_exact(input_size, input_size, FilterType::Triangle)
            .to_rgb8();

        let (w, h) = (input_size as usize, input_size as usize);
        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * h * w);
        for c in 0..3 {
            for y in 0..h {
                for x in 0..w {
                    let pixel = resized.get_pixel(x as u32, y as u32);
                    chw_data.push(pixel[c] as f32 / 255.0);
                }
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| PipelineError::detection_failed(format!("failed to create tensor: {}", e)))
    }

    fn run_inference(&self, input: Value) -> PipelineResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| PipelineError::internal("session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| PipelineError::detection_failed(format!("inference failed: {}", e)))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| PipelineError::detection_failed("missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::detection_failed(format!("failed to extract tensor: {}", e)))?;

        Ok(tensor.1.iter().copied().collect())
    }

    /// Decode the `[1, 4 + C, N]` output into pixel-space detections.
    fn postprocess(
        &self,
        outputs: &[f32],
        orig_width: u32,
        orig_height: u32,
    ) -> PipelineResult<Vec<Detection>> {
        let num_classes = self.config.labels.len();
        let num_features = 4 + num_classes;

        if outputs.is_empty() || outputs.len() % num_features != 0 {
            return Err(PipelineError::detection_failed(format!(
                "unexpected output size {} for {} features",
                outputs.len(),
                num_features
            )));
        }
        let num_boxes = outputs.len() / num_features;

        let output_array = Array::from_shape_vec((num_features, num_boxes), outputs.to_vec())
            .map_err(|e| PipelineError::detection_failed(format!("failed to reshape output: {}", e)))?;
        let transposed = output_array.t();

        let input_size = self.config.input_size as f32;
        let scale_w = orig_width as f32 / input_size;
        let scale_h = orig_height as f32 / input_size;

        let mut candidates: Vec<Detection> = Vec::new();
        for i in 0..num_boxes {
            let cx = transposed[[i, 0]];
            let cy = transposed[[i, 1]];
            let w = transposed[[i, 2]];
            let h = transposed[[i, 3]];

            let mut best_class = 0;
            let mut best_score = 0.0f32;
            for c in 0..num_classes {
                let score = transposed[[i, 4 + c]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }

            if best_score < self.config.confidence_floor {
                continue;
            }

            let x1 = ((cx - w / 2.0) * scale_w).clamp(0.0, orig_width as f32);
            let y1 = ((cy - h / 2.0) * scale_h).clamp(0.0, orig_height as f32);
            let x2 = ((cx + w / 2.0) * scale_w).clamp(0.0, orig_width as f32);
            let y2 = ((cy + h / 2.0) * scale_h).clamp(0.0, orig_height as f32);

            candidates.push(Detection::new(
                self.config.labels[best_class].clone(),
                best_score,
                BoundingBox::new(x1, y1, x2, y2),
            ));
        }

        Ok(non_maximum_suppression(candidates, self.config.nms_threshold))
    }
}

impl Detector for OnnxDetector {
    fn detect(&self, frame: &RgbImage) -> PipelineResult<Vec<Detection>> {
        let (width, height) = frame.dimensions();
        let input = self.preprocess(frame)?;
        let outputs = self.run_inference(input)?;
        let detections = self.postprocess(&outputs, width, height)?;

        debug!(count = detections.len(), "Detection completed");
        Ok(detections)
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

/// Class-aware Non-Maximum Suppression.
fn non_maximum_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    if detections.is_empty() {
        return detections;
    }

    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] || detections[i].label != detections[j].label {
                continue;
            }
            if detections[i].bbox.iou(&detections[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Create an ONNX Runtime session.
fn create_session(model_path: &Path) -> PipelineResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| PipelineError::internal(format!("failed to read model file: {}", e)))?;

    Session::builder()
        .map_err(|e| PipelineError::internal(format!("failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| PipelineError::internal(format!("failed to set optimization level: {}", e)))?
        .commit_from_memory(&model_bytes)
        .map_err(|e| PipelineError::internal(format!("failed to load ONNX model: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, confidence: f32, x1: f32) -> Detection {
        Detection::new(label, confidence, BoundingBox::new(x1, 0.0, x1 + 10.0, 10.0))
    }

    #[test]
    fn test_nms_suppresses_overlapping_same_class() {
        let a = det("player", 0.9, 0.0);
        let b = det("player", 0.8, 1.0); // heavy overlap with a
        let kept = non_maximum_suppression(vec![b, a], 0.45);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_different_classes() {
        let a = det("player", 0.9, 0.0);
        let b = det("ball", 0.8, 1.0);
        let kept = non_maximum_suppression(vec![a, b], 0.45);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_nms_keeps_disjoint_boxes() {
        let a = det("player", 0.9, 0.0);
        let b = det("player", 0.8, 100.0);
        let kept = non_maximum_suppression(vec![a, b], 0.45);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_missing_model_fails() {
        let config = OnnxDetectorConfig {
            model_path: PathBuf::from("/nonexistent/model.onnx"),
            ..Default::default()
        };
        assert!(matches!(
            OnnxDetector::new(config),
            Err(PipelineError::ModelNotFound(_))
        ));
    }
}
