//! Source descriptor resolution.
//!
//! Turns a caller-supplied descriptor (local path or remote URL) into a
//! local, decodable media file. Remote sources are fetched through the
//! injected [`Downloader`] into a scoped temp directory that lives exactly
//! as long as the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info};
use url::Url;

use crate::download::Downloader;
use crate::error::{PipelineError, PipelineResult};

/// A resolved, locally readable media source.
///
/// For remote descriptors the backing temp directory is dropped (and the
/// download deleted) together with this value.
#[derive(Debug)]
pub struct ResolvedSource {
    path: PathBuf,
    _temp: Option<TempDir>,
}

impl ResolvedSource {
    /// Path to the local media file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Resolves source descriptors into local media files.
pub struct SourceResolver {
    downloader: Arc<dyn Downloader>,
}

impl SourceResolver {
    /// Create a resolver with the given download capability.
    pub fn new(downloader: Arc<dyn Downloader>) -> Self {
        Self { downloader }
    }

    /// Resolve a descriptor into a local media file.
    ///
    /// Local existing paths are returned unchanged; `http`/`https` URLs are
    /// downloaded. Anything else fails with `SourceUnavailable`. Retry, if
    /// any, is the downloader's concern.
    pub async fn resolve(&self, descriptor: &str) -> PipelineResult<ResolvedSource> {
        let local = Path::new(descriptor);
        if local.is_file() {
            debug!(path = %local.display(), "Using local media source");
            return Ok(ResolvedSource {
                path: local.to_path_buf(),
                _temp: None,
            });
        }

        let is_remote = matches!(
            Url::parse(descriptor),
            Ok(url) if url.scheme() == "http" || url.scheme() == "https"
        );
        if !is_remote {
            return Err(PipelineError::source_unavailable(format!(
                "'{}' is neither an existing file nor an http(s) URL",
                descriptor
            )));
        }

        let temp = TempDir::new()?;
        let dest = temp.path().join("source.mp4");

        info!(
            url = %descriptor,
            downloader = self.downloader.name(),
            "Resolving remote media source"
        );

        self.downloader
            .fetch(descriptor, &dest)
            .await
            .map_err(|e| PipelineError::source_unavailable(e.to_string()))?;

        Ok(ResolvedSource {
            path: dest,
            _temp: Some(temp),
        })
    }
}
