//! Embedding extractor collaborator.

use glance_core::Detection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("extractor backend: {0}")]
    Backend(String),
}

/// Black-box face detector and embedder.
///
/// Implementations wrap whatever model stack turns a frame into fixed-length
/// numeric vectors; the daemon only consumes the resulting detections and
/// never looks inside the model. An empty result means no faces in frame.
pub trait FaceExtractor: Send {
    /// Detect faces in an encoded frame, returning one detection per face
    /// with its embedding and a crop of the face region.
    fn extract(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, ExtractorError>;
}
