//! Remote media download capability.
//!
//! The pipeline core only depends on the [`Downloader`] trait; the
//! production implementation shells out to yt-dlp with bounded retry, the
//! same network-retry shape used by the rest of the system.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};

/// Retry policy for transient download failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    /// Delay before the retry following `attempt` (0-based), capped.
    fn delay(&self, attempt: u32) -> Duration {
        let exp = self.base_delay_ms.saturating_mul(1u64 << attempt.min(16));
        Duration::from_millis(exp.min(self.max_delay_ms))
    }
}

/// Capability for resolving a remote URL into a local media file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` to `dest`. The file must exist on success.
    async fn fetch(&self, url: &str, dest: &Path) -> PipelineResult<()>;

    /// Implementation name for logging.
    fn name(&self) -> &'static str;
}

/// Check if a URL belongs to a platform yt-dlp is known to handle.
pub fn is_supported_url(url: &str) -> bool {
    let supported_domains = ["youtube.com", "youtu.be", "vimeo.com", "twitch.tv"];
    supported_domains.iter().any(|domain| url.contains(domain))
}

/// Production downloader backed by the yt-dlp CLI.
#[derive(Debug, Clone, Default)]
pub struct YtDlpDownloader {
    retry: RetryConfig,
}

impl YtDlpDownloader {
    /// Create a downloader with the default retry policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_once(&self, url: &str, dest: &Path) -> PipelineResult<()> {
        let dest_str = dest.to_string_lossy();

        let output = Command::new("yt-dlp")
            .args([
                "--quiet",
                "--no-warnings",
                "-f",
                "bestvideo[ext=mp4]/best[ext=mp4]/best",
                "-o",
                &dest_str,
                url,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            return Err(PipelineError::download_failed(format!(
                "yt-dlp failed: {}",
                stderr.lines().last().unwrap_or("unknown error")
            )));
        }

        if !dest.exists() {
            return Err(PipelineError::download_failed("output file not created"));
        }

        Ok(())
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn fetch(&self, url: &str, dest: &Path) -> PipelineResult<()> {
        which::which("yt-dlp").map_err(|_| PipelineError::YtDlpNotFound)?;

        info!(url = %url, dest = %dest.display(), "Downloading remote source");

        let mut last_error = None;
        for attempt in 0..=self.retry.max_retries {
            match self.fetch_once(url, dest).await {
                Ok(()) => {
                    let size = dest.metadata().map(|m| m.len()).unwrap_or(0);
                    info!(
                        dest = %dest.display(),
                        size_mb = size as f64 / (1024.0 * 1024.0),
                        "Download finished"
                    );
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        url = %url,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Download failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| PipelineError::download_failed("retries exhausted")))
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
