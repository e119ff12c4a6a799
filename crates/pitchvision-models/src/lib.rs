//! Shared data models for the PitchVision annotation pipeline.
//!
//! This crate provides the plain types exchanged between pipeline stages:
//! - Bounding boxes and scored detections
//! - Jersey color descriptors
//! - Run configuration with validation
//! - Annotated output frames

pub mod color;
pub mod config;
pub mod detection;
pub mod frame;

// Re-export common types
pub use color::ColorDescriptor;
pub use config::{ConfigError, PipelineConfig, DEFAULT_CONFIDENCE_THRESHOLD};
pub use detection::{BoundingBox, Detection};
pub use frame::AnnotatedFrame;
