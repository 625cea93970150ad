//! Pipeline error taxonomy
//!
//! Fatal failures abort the edit before any pixel is mutated; "no text
//! matched" is a normal outcome (`replaced_count == 0`), not an error.

use thiserror::Error;

/// Errors surfaced by the edit pipeline.
#[derive(Debug, Error)]
pub enum EditError {
    /// Input bytes are not a decodable image.
    #[error("failed to decode input image")]
    ImageDecode(#[source] image::ImageError),

    /// Output buffer could not be serialized to PNG.
    #[error("failed to encode output image")]
    ImageEncode(#[source] image::ImageError),

    /// The detector model failed to initialize. Distinct from "zero text
    /// found": callers must not report this as a clean no-match run.
    #[error("text detector unavailable")]
    ModelUnavailable(#[source] anyhow::Error),

    /// Inference failed after the model loaded successfully.
    #[error("text detection failed")]
    Detection(#[source] anyhow::Error),
}
