//! Run orchestration: resolve, sample, detect, bootstrap, annotate, collect.
//!
//! One [`AnnotationPipeline::run`] call processes one source end to end.
//! The team color model is constructed fresh per run and threaded through
//! every frame; per-frame detector and encoder failures are isolated so a
//! bad frame never terminates a run that is otherwise producing samples.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};

use pitchvision_models::{AnnotatedFrame, PipelineConfig};

use crate::annotate::Annotator;
use crate::detector::Detector;
use crate::download::{Downloader, YtDlpDownloader};
use crate::error::{PipelineError, PipelineResult};
use crate::sampler::{FrameSampler, FrameStream, RawFrame};
use crate::source::SourceResolver;
use crate::team_color::{Clusterer, KMeansClusterer, TeamColorModel};

/// A bounded, ordered sequence of sampled frames.
///
/// [`FrameStream`] is the production implementation; the seam exists so the
/// orchestration invariants are testable with synthetic frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Next sampled frame; `None` is normal termination.
    async fn next_frame(&mut self) -> PipelineResult<Option<RawFrame>>;
}

#[async_trait]
impl FrameSource for FrameStream {
    async fn next_frame(&mut self) -> PipelineResult<Option<RawFrame>> {
        FrameStream::next_frame(self).await
    }
}

/// The annotation pipeline for one detector backend.
///
/// Reusable across runs; all per-run state (team color model, output
/// buffer, stream handle) is scoped to [`AnnotationPipeline::run`].
pub struct AnnotationPipeline {
    detector: Arc<dyn Detector>,
    downloader: Arc<dyn Downloader>,
    clusterer: Arc<dyn Clusterer>,
    annotator: Annotator,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl AnnotationPipeline {
    /// Create a pipeline with the default downloader (yt-dlp), clusterer
    /// (k-means) and annotator.
    pub fn new(detector: Arc<dyn Detector>) -> Self {
        Self {
            detector,
            downloader: Arc::new(YtDlpDownloader::new()),
            clusterer: Arc::new(KMeansClusterer::default()),
            annotator: Annotator::new(),
            cancel_rx: None,
        }
    }

    /// Override the download capability.
    pub fn with_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = downloader;
        self
    }

    /// Override the clustering capability.
    pub fn with_clusterer(mut self, clusterer: Arc<dyn Clusterer>) -> Self {
        self.clusterer = clusterer;
        self
    }

    /// Override the annotator (e.g. to set an explicit font).
    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    /// Set a cancellation signal, checked between frames.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_rx
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }

    /// Annotate one source end to end.
    ///
    /// Returns the ordered annotated frames, at most `config.max_samples`
    /// of them. Fails fatally (with no partial output) when the source
    /// cannot be resolved or the config is invalid; per-frame failures are
    /// logged and skipped.
    pub async fn run(
        &self,
        descriptor: &str,
        config: &PipelineConfig,
    ) -> PipelineResult<Vec<AnnotatedFrame>> {
        config.validate()?;

        info!(
            source = %descriptor,
            detector = self.detector.name(),
            max_samples = config.max_samples,
            sample_stride = config.sample_stride,
            "Starting annotation run"
        );

        let resolver = SourceResolver::new(self.downloader.clone());
        let source = resolver.resolve(descriptor).await?;

        let mut stream =
            FrameSampler::open(source.path(), config.sample_stride, config.max_samples).await?;

        // The stream handle must be released on every exit path.
        let result = self.annotate_stream(&mut stream, config).await;
        stream.close().await;

        let frames = result?;
        info!(frames = frames.len(), "Annotation run finished");
        Ok(frames)
    }

    /// The per-frame loop, shared between production and test frame sources.
    pub(crate) async fn annotate_stream<S: FrameSource>(
        &self,
        source: &mut S,
        config: &PipelineConfig,
    ) -> PipelineResult<Vec<AnnotatedFrame>> {
        let mut model = TeamColorModel::new();
        let mut frames = Vec::new();

        loop {
            if self.is_cancelled() {
                info!("Annotation run cancelled");
                return Err(PipelineError::Cancelled);
            }

            let Some(frame) = source.next_frame().await? else {
                break;
            };

            let detections = match self.detector.detect(&frame.image) {
                Ok(detections) => detections,
                Err(e) => {
                    warn!(
                        frame_index = frame.index,
                        "Detection failed, skipping frame: {}", e
                    );
                    continue;
                }
            };

            if !model.is_initialized() {
                model.bootstrap(
                    &detections,
                    &frame.image,
                    config.bootstrap_min_players,
                    self.clusterer.as_ref(),
                );
            }

            match self
                .annotator
                .process(&frame, &detections, &model, config)
            {
                Ok(annotated) => frames.push(annotated),
                Err(e) => {
                    warn!(
                        frame_index = frame.index,
                        "Encoding failed, dropping frame: {}", e
                    );
                }
            }
        }

        Ok(frames)
    }
}
