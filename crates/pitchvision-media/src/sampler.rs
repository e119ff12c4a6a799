//! Strided frame sampling from a decodable video stream.
//!
//! Spawns FFmpeg to decode the source into raw RGB24 frames on stdout and
//! yields every `stride`-th decoded frame, tagged with its decode-order
//! index, until `max_samples` frames have been yielded or the stream ends.
//! The child process is the scoped stream handle: it is killed on every
//! exit path, including early drop.

use std::path::Path;
use std::process::Stdio;

use image::RgbImage;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::probe::{probe_video, VideoInfo};

/// A raw decoded frame selected by the sampler.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Decode-order index of this frame in the source stream.
    pub index: u64,
    /// Decoded RGB pixels.
    pub image: RgbImage,
}

/// Decision for one decoded frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admit {
    /// Yield this frame with the given decode-order index.
    Yield(u64),
    /// Decode and discard this frame.
    Skip,
    /// The sample budget is exhausted; stop decoding.
    Done,
}

/// Pure sampling arithmetic: which decoded frames are yielded.
///
/// Kept separate from the FFmpeg plumbing so the stride and bound
/// invariants are testable without a video.
#[derive(Debug, Clone)]
pub struct SampleBudget {
    stride: u64,
    max_samples: u32,
    decoded: u64,
    yielded: u32,
}

impl SampleBudget {
    /// Create a budget. `stride` and `max_samples` must both be >= 1
    /// (enforced by config validation upstream).
    pub fn new(stride: u32, max_samples: u32) -> Self {
        Self {
            stride: stride.max(1) as u64,
            max_samples,
            decoded: 0,
            yielded: 0,
        }
    }

    /// Account for the next decoded frame and decide what to do with it.
    pub fn admit(&mut self) -> Admit {
        if self.yielded >= self.max_samples {
            return Admit::Done;
        }
        let index = self.decoded;
        self.decoded += 1;
        if index % self.stride == 0 {
            self.yielded += 1;
            Admit::Yield(index)
        } else {
            Admit::Skip
        }
    }

    /// Number of frames yielded so far.
    pub fn yielded(&self) -> u32 {
        self.yielded
    }
}

/// Open a sampled frame stream over a local video file.
pub struct FrameSampler;

impl FrameSampler {
    /// Probe the video and spawn the decoding process.
    pub async fn open(
        path: impl AsRef<Path>,
        stride: u32,
        max_samples: u32,
    ) -> PipelineResult<FrameStream> {
        let path = path.as_ref();
        let info = probe_video(path).await?;

        which::which("ffmpeg").map_err(|_| PipelineError::FfmpegNotFound)?;

        debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            stride,
            max_samples,
            "Opening frame stream"
        );

        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::internal("FFmpeg stdout not captured"))?;

        Ok(FrameStream {
            child,
            stdout: BufReader::new(stdout),
            info,
            budget: SampleBudget::new(stride, max_samples),
            frame_buf: vec![0u8; (info.width * info.height * 3) as usize],
            finished: false,
        })
    }
}

/// A lazy, finite, non-restartable sequence of sampled frames.
pub struct FrameStream {
    child: Child,
    stdout: BufReader<ChildStdout>,
    info: VideoInfo,
    budget: SampleBudget,
    frame_buf: Vec<u8>,
    finished: bool,
}

impl FrameStream {
    /// Video geometry of the underlying stream.
    pub fn info(&self) -> VideoInfo {
        self.info
    }

    /// Read the next sampled frame.
    ///
    /// Returns `Ok(None)` on normal termination: either `max_samples` frames
    /// have been yielded or the stream is exhausted. The output may be
    /// shorter than `max_samples`; that is not an error. A pipe failure
    /// before the first yielded frame is fatal; after it, the stream just
    /// ends early.
    pub async fn next_frame(&mut self) -> PipelineResult<Option<RawFrame>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let yielded_before = self.budget.yielded();
            let admit = self.budget.admit();
            if admit == Admit::Done {
                self.finish().await;
                return Ok(None);
            }

            if !fill_frame(&mut self.stdout, &mut self.frame_buf, yielded_before).await? {
                // End of stream before the budget ran out.
                self.finish().await;
                return Ok(None);
            }

            if let Admit::Yield(index) = admit {
                let image = RgbImage::from_raw(
                    self.info.width,
                    self.info.height,
                    self.frame_buf.clone(),
                )
                .ok_or_else(|| {
                    PipelineError::DecodeFailed("frame buffer size mismatch".to_string())
                })?;
                return Ok(Some(RawFrame { index, image }));
            }
        }
    }

    async fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
            info!(frames = self.budget.yielded(), "Frame stream closed");
        }
    }

    /// Release the underlying decoding process.
    ///
    /// Dropping the stream also kills the child (`kill_on_drop`); calling
    /// this explicitly additionally reaps it.
    pub async fn close(mut self) {
        self.finish().await;
    }
}

/// Fill `buf` with one decoded frame from `reader`.
///
/// Returns `false` on end of stream. A truncated trailing frame, or a read
/// failure once `yielded` frames are already out, ends the stream instead
/// of failing the run; a failure before the first yield is fatal.
async fn fill_frame<R>(reader: &mut R, buf: &mut [u8], yielded: u32) -> PipelineResult<bool>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = match reader.read(&mut buf[filled..]).await {
            Ok(n) => n,
            Err(e) if yielded > 0 => {
                warn!(error = %e, "Frame pipe failed mid-stream, ending stream early");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            if filled > 0 {
                warn!(
                    bytes = filled,
                    frame_len = buf.len(),
                    "Discarding truncated trailing frame"
                );
            }
            return Ok(false);
        }
        filled += n;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_indices(stride: u32, max_samples: u32, stream_len: u64) -> Vec<u64> {
        let mut budget = SampleBudget::new(stride, max_samples);
        let mut indices = Vec::new();
        for _ in 0..stream_len {
            match budget.admit() {
                Admit::Yield(i) => indices.push(i),
                Admit::Skip => {}
                Admit::Done => break,
            }
        }
        indices
    }

    #[test]
    fn test_stride_yields_expected_indices() {
        // 200-frame stream, stride 30, max 5 -> exactly 0,30,60,90,120.
        assert_eq!(collect_indices(30, 5, 200), vec![0, 30, 60, 90, 120]);
    }

    #[test]
    fn test_short_stream_yields_fewer_frames() {
        assert_eq!(collect_indices(30, 5, 70), vec![0, 30, 60]);
    }

    #[test]
    fn test_stride_one_is_dense() {
        assert_eq!(collect_indices(1, 4, 100), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_budget_never_exceeds_max() {
        for stride in [1, 7, 30] {
            for max in [1, 5, 10] {
                let indices = collect_indices(stride, max, 1000);
                assert!(indices.len() <= max as usize);
            }
        }
    }

    #[test]
    fn test_indices_strictly_increasing() {
        let indices = collect_indices(7, 10, 500);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_done_after_budget_exhausted() {
        let mut budget = SampleBudget::new(1, 1);
        assert_eq!(budget.admit(), Admit::Yield(0));
        assert_eq!(budget.admit(), Admit::Done);
        assert_eq!(budget.admit(), Admit::Done);
    }

    #[tokio::test]
    async fn test_pipe_error_after_first_frame_ends_stream() {
        let mut reader = tokio_test::io::Builder::new()
            .read(&[1, 2, 3, 4])
            .read_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "pipe closed",
            ))
            .build();
        let mut buf = vec![0u8; 4];

        assert!(fill_frame(&mut reader, &mut buf, 0).await.unwrap());
        assert_eq!(buf, vec![1, 2, 3, 4]);
        // One frame is out; a failing pipe now means a shorter stream.
        assert!(!fill_frame(&mut reader, &mut buf, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_pipe_error_before_first_frame_is_fatal() {
        let mut reader = tokio_test::io::Builder::new()
            .read_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "pipe closed",
            ))
            .build();
        let mut buf = vec![0u8; 4];

        let err = fill_frame(&mut reader, &mut buf, 0).await.unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
