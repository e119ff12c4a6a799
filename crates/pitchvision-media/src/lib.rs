//! Video annotation pipeline for match footage.
//!
//! This crate provides:
//! - Source resolution for local files and remote URLs (via yt-dlp)
//! - Strided frame sampling over FFmpeg rawvideo output
//! - A pluggable object detection capability (ONNX Runtime backend
//!   behind the `onnx` feature)
//! - A run-scoped, bootstrap-once team color classifier
//! - Per-class annotation policies and JPEG rendering
//! - Orchestration with cancellation and per-frame failure isolation

pub mod annotate;
pub mod detector;
pub mod download;
pub mod error;
pub mod pipeline;
pub mod probe;
pub mod sampler;
pub mod source;
pub mod team_color;

pub use annotate::{plan_annotations, Annotator, PlannedAnnotation, SINGLETON_CLASSES};
pub use detector::Detector;
#[cfg(feature = "onnx")]
pub use detector::{OnnxDetector, OnnxDetectorConfig, MATCH_CLASSES};
pub use download::{is_supported_url, Downloader, RetryConfig, YtDlpDownloader};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{AnnotationPipeline, FrameSource};
pub use probe::{probe_video, VideoInfo};
pub use sampler::{FrameSampler, FrameStream, RawFrame, SampleBudget};
pub use source::{ResolvedSource, SourceResolver};
pub use team_color::{
    jersey_descriptor, Clusterer, KMeansClusterer, TeamAssignment, TeamCentroids, TeamColorModel,
};
