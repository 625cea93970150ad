//! Text localization layer
//!
//! Wraps the ONNX-based detector engine behind a small trait seam so the
//! edit pipeline can run against any source of detections (including test
//! stubs). The real engine is expensive to load and is memoized
//! process-wide.

pub mod engine;
pub mod models;

use std::path::Path;
use std::sync::OnceLock;

use image::RgbImage;
use parking_lot::Mutex;

use crate::error::EditError;

pub use engine::PaddleOcrEngine;
pub use models::{ModelKind, ModelManager};

/// One localized text occurrence.
///
/// Immutable once produced; `quad` is in source-image coordinates in the
/// engine's emission order (no ranking implied beyond that).
#[derive(Debug, Clone)]
pub struct Detection {
    /// Corner points of the detected region
    pub quad: [(f32, f32); 4],
    /// Recognized text content
    pub text: String,
    /// Recognition confidence (0.0 - 1.0), passed through unmodified
    pub confidence: f32,
}

impl Detection {
    /// Reduce the quad to an axis-aligned bounding box clamped to the
    /// image bounds. A quad entirely outside the image collapses to a
    /// zero-area box.
    pub fn bounds(&self, img_width: u32, img_height: u32) -> BoundingBox {
        let min_x = self.quad.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
        let min_y = self.quad.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
        let max_x = self.quad.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
        let max_y = self.quad.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);

        BoundingBox {
            x1: (min_x.max(0.0) as u32).min(img_width),
            y1: (min_y.max(0.0) as u32).min(img_height),
            x2: (max_x.max(0.0) as u32).min(img_width),
            y2: (max_y.max(0.0) as u32).min(img_height),
        }
    }
}

/// Axis-aligned box with `x1 <= x2`, `y1 <= y2`, clamped to image bounds.
/// Pixel coordinates, exclusive on the far edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    /// Zero-area boxes are skipped by the pipeline as no-ops.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Geometric center of the box.
    pub fn center(&self) -> (u32, u32) {
        (self.x1 + self.width() / 2, self.y1 + self.height() / 2)
    }
}

/// Source of text detections for the edit pipeline.
pub trait TextDetector {
    /// Run localization + recognition over a decoded RGB buffer.
    ///
    /// Returns detections in the engine's emission order. Pure with
    /// respect to the input buffer: no state mutation across calls
    /// beyond model reuse.
    fn detect(&self, image: &RgbImage) -> anyhow::Result<Vec<Detection>>;
}

static ENGINE: OnceLock<PaddleOcrEngine> = OnceLock::new();
static ENGINE_INIT: Mutex<()> = Mutex::new(());

/// Get the process-wide detector engine, loading it on first use.
///
/// Model load takes seconds (possibly a download on a cold cache), so the
/// handle is initialized at most once and shared read-only afterwards.
/// Double-checked around an init mutex so concurrent first callers do not
/// build the engine twice.
pub fn global_engine(models_dir: Option<&Path>) -> Result<&'static PaddleOcrEngine, EditError> {
    if let Some(engine) = ENGINE.get() {
        return Ok(engine);
    }

    let _guard = ENGINE_INIT.lock();
    if let Some(engine) = ENGINE.get() {
        return Ok(engine);
    }

    let manager = match models_dir {
        Some(dir) => ModelManager::with_dir(dir.to_path_buf()),
        None => ModelManager::new(),
    }
    .map_err(EditError::ModelUnavailable)?;

    let engine = PaddleOcrEngine::load(&manager).map_err(EditError::ModelUnavailable)?;
    Ok(ENGINE.get_or_init(|| engine))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(quad: [(f32, f32); 4]) -> Detection {
        Detection {
            quad,
            text: "test".to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_bounds_from_quad() {
        let det = detection([(20.0, 40.0), (120.0, 40.0), (120.0, 70.0), (20.0, 70.0)]);
        let b = det.bounds(200, 100);
        assert_eq!(b, BoundingBox::new(20, 40, 120, 70));
        assert_eq!(b.width(), 100);
        assert_eq!(b.height(), 30);
    }

    #[test]
    fn test_bounds_unordered_corners() {
        // Corner order must not matter, only min/max
        let det = detection([(120.0, 70.0), (20.0, 40.0), (120.0, 40.0), (20.0, 70.0)]);
        let b = det.bounds(200, 100);
        assert_eq!(b, BoundingBox::new(20, 40, 120, 70));
    }

    #[test]
    fn test_bounds_clamped_to_image() {
        let det = detection([(-10.0, -5.0), (250.0, -5.0), (250.0, 130.0), (-10.0, 130.0)]);
        let b = det.bounds(200, 100);
        assert_eq!(b, BoundingBox::new(0, 0, 200, 100));
        assert!(b.x1 <= b.x2 && b.y1 <= b.y2);
    }

    #[test]
    fn test_bounds_fully_outside_is_empty() {
        let det = detection([(300.0, 150.0), (350.0, 150.0), (350.0, 180.0), (300.0, 180.0)]);
        let b = det.bounds(200, 100);
        assert!(b.is_empty());
    }

    #[test]
    fn test_center() {
        let b = BoundingBox::new(20, 40, 120, 70);
        assert_eq!(b.center(), (70, 55));
    }
}
