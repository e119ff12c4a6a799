//! Frame annotation and encoding.
//!
//! Converts one frame's detections into a rendered, JPEG-encoded image.
//! Selection is split from rendering: [`plan_annotations`] applies the
//! per-class thresholds and selection policies and is pure; [`Annotator`]
//! draws the planned boxes and encodes the result.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, warn};

use pitchvision_models::{AnnotatedFrame, Detection, PipelineConfig};

use crate::error::{PipelineError, PipelineResult};
use crate::sampler::RawFrame;
use crate::team_color::{jersey_descriptor, TeamAssignment, TeamColorModel};

/// Classes reduced to at most one rendered instance per frame.
pub const SINGLETON_CLASSES: [&str; 3] = ["ball", "main referee", "side referee"];

const TEAM_A_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEAM_B_COLOR: Rgb<u8> = Rgb([255, 140, 0]);
const NEUTRAL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BALL_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const MAIN_REF_COLOR: Rgb<u8> = Rgb([0, 255, 255]);
const SIDE_REF_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

const BOX_THICKNESS: u32 = 2;
const LABEL_SCALE: f32 = 18.0;

/// One box the renderer will draw.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAnnotation {
    pub detection: Detection,
    pub label: String,
    pub color: Rgb<u8>,
}

/// Render "main referee" as "Main Referee", etc.
fn title_case(label: &str) -> String {
    label
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Apply thresholds and selection policies to one frame's detections.
///
/// Players and unrecognized classes are planned immediately; singleton
/// classes are reduced to the highest-confidence surviving detection
/// (first seen wins an exact confidence tie) and appended after the scan
/// in fixed order: ball, main referee, side referee.
pub fn plan_annotations(
    frame: &RgbImage,
    detections: &[Detection],
    model: &TeamColorModel,
    config: &PipelineConfig,
) -> Vec<PlannedAnnotation> {
    let mut plans = Vec::new();
    let mut singletons: [Option<&Detection>; 3] = [None, None, None];

    for detection in detections {
        if detection.confidence < config.threshold_for(&detection.label) {
            continue;
        }

        if let Some(slot) = SINGLETON_CLASSES
            .iter()
            .position(|c| *c == detection.label)
        {
            let better = match singletons[slot] {
                Some(best) => detection.confidence > best.confidence,
                None => true,
            };
            if better {
                singletons[slot] = Some(detection);
            }
            continue;
        }

        if detection.is_player() {
            let descriptor = jersey_descriptor(frame, &detection.bbox);
            let (label, color) = match model.classify(&descriptor) {
                TeamAssignment::TeamA => (config.team_names.0.clone(), TEAM_A_COLOR),
                TeamAssignment::TeamB => (config.team_names.1.clone(), TEAM_B_COLOR),
                TeamAssignment::Unknown => ("Unknown".to_string(), NEUTRAL_COLOR),
            };
            plans.push(PlannedAnnotation {
                detection: detection.clone(),
                label,
                color,
            });
        } else {
            plans.push(PlannedAnnotation {
                detection: detection.clone(),
                label: title_case(&detection.label),
                color: NEUTRAL_COLOR,
            });
        }
    }

    let singleton_styles = [
        ("Ball".to_string(), BALL_COLOR),
        (config.referee_names.0.clone(), MAIN_REF_COLOR),
        (config.referee_names.1.clone(), SIDE_REF_COLOR),
    ];
    for (slot, (label, color)) in singleton_styles.into_iter().enumerate() {
        if let Some(detection) = singletons[slot] {
            plans.push(PlannedAnnotation {
                detection: detection.clone(),
                label,
                color,
            });
        }
    }

    plans
}

/// Draws planned annotations and encodes frames to JPEG.
pub struct Annotator {
    font: Option<FontArc>,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

impl Annotator {
    /// Create an annotator, discovering a label font from common system
    /// locations. Without a font, boxes are drawn without text.
    pub fn new() -> Self {
        Self {
            font: load_font(None),
        }
    }

    /// Create an annotator with an explicit font file.
    pub fn with_font_path(path: impl Into<PathBuf>) -> Self {
        Self {
            font: load_font(Some(&path.into())),
        }
    }

    /// Annotate one frame: plan, draw, encode.
    ///
    /// The output image has the same dimensions as the input frame.
    pub fn process(
        &self,
        frame: &RawFrame,
        detections: &[Detection],
        model: &TeamColorModel,
        config: &PipelineConfig,
    ) -> PipelineResult<AnnotatedFrame> {
        let plans = plan_annotations(&frame.image, detections, model, config);
        debug!(
            frame_index = frame.index,
            detections = detections.len(),
            drawn = plans.len(),
            "Annotating frame"
        );

        let mut canvas = frame.image.clone();
        for plan in &plans {
            self.draw(&mut canvas, plan);
        }

        let jpeg = encode_jpeg(&canvas)?;
        Ok(AnnotatedFrame::new(frame.index, jpeg))
    }

    fn draw(&self, canvas: &mut RgbImage, plan: &PlannedAnnotation) {
        let (width, height) = canvas.dimensions();
        let Some((x, y, w, h)) = plan.detection.bbox.to_pixel_rect(width, height) else {
            return;
        };

        for t in 0..BOX_THICKNESS {
            if w > 2 * t && h > 2 * t {
                let rect = Rect::at((x + t) as i32, (y + t) as i32).of_size(w - 2 * t, h - 2 * t);
                draw_hollow_rect_mut(canvas, rect, plan.color);
            }
        }

        if let Some(font) = &self.font {
            let text_y = y.saturating_sub(LABEL_SCALE as u32 + 4) as i32;
            draw_text_mut(
                canvas,
                plan.color,
                x as i32,
                text_y,
                PxScale::from(LABEL_SCALE),
                font,
                &plan.label,
            );
        }
    }
}

/// Encode an annotated frame as JPEG.
fn encode_jpeg(image: &RgbImage) -> PipelineResult<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), 90);
    image
        .write_with_encoder(encoder)
        .map_err(|e| PipelineError::EncodingFailed(e.to_string()))?;
    Ok(buf)
}

/// Locate a TrueType font for label text.
fn load_font(explicit: Option<&Path>) -> Option<FontArc> {
    let fallbacks = [
        Path::new("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
        Path::new("/usr/share/fonts/TTF/DejaVuSans.ttf"),
        Path::new("/usr/share/fonts/dejavu/DejaVuSans.ttf"),
        Path::new("/Library/Fonts/Arial.ttf"),
    ];

    let candidates = explicit.into_iter().chain(fallbacks.into_iter());
    for path in candidates {
        if let Ok(bytes) = std::fs::read(path) {
            match FontArc::try_from_vec(bytes) {
                Ok(font) => return Some(font),
                Err(e) => warn!(path = %path.display(), "Failed to parse font: {}", e),
            }
        }
    }

    warn!("No label font found; annotations will be drawn without text");
    None
}
