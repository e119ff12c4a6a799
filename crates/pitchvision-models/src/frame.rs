//! Annotated output frames.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// One rendered, encoded frame produced by the annotation pipeline.
///
/// `index` is the decode-order position of the source frame, so a run with
/// stride 30 yields indices 0, 30, 60, ... The sequence returned by a run
/// is strictly increasing in `index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedFrame {
    /// Decode-order index of the source frame.
    pub index: u64,
    /// JPEG-encoded annotated image.
    pub jpeg: Vec<u8>,
}

impl AnnotatedFrame {
    /// Create a new annotated frame.
    pub fn new(index: u64, jpeg: Vec<u8>) -> Self {
        Self { index, jpeg }
    }

    /// Encode the JPEG bytes as base64 for transport (e.g. JSON payloads).
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.jpeg)
    }
}
