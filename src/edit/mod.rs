//! Edit pipeline
//!
//! Detect text, erase the target occurrences by reconstructing the
//! background, and draw the replacement string into the same boxes.
//! Everything is created and discarded within one invocation; the only
//! cross-invocation state is the memoized detector handle.

pub mod background;
pub mod bitmap_font;
pub mod color;
pub mod fit;

use std::io::Cursor;
use std::time::Instant;

use image::RgbImage;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::detect::{Detection, TextDetector};
use crate::error::EditError;
use fit::FontLoader;

/// Result of one edit invocation.
#[derive(Debug)]
pub struct EditOutcome {
    /// Edited image, PNG-encoded (lossless)
    pub image_png: Vec<u8>,
    /// All recognized strings, in the detector's emission order
    pub detected_texts: Vec<String>,
    /// Number of matches actually erased and redrawn. Zero means the
    /// target was not found; that is a normal outcome, not an error.
    pub replaced_count: usize,
}

/// Run the full detect-erase-redraw pipeline over an encoded image.
///
/// Decode and detection failures abort before any pixel is mutated; the
/// buffer is never returned partially edited.
pub fn edit_image(
    image_bytes: &[u8],
    target: &str,
    replacement: &str,
    config: &AppConfig,
    detector: &dyn TextDetector,
) -> Result<EditOutcome, EditError> {
    let start = Instant::now();

    let decoded = image::load_from_memory(image_bytes).map_err(EditError::ImageDecode)?;
    let mut buffer = decoded.to_rgb8();

    let detections = detector.detect(&buffer).map_err(EditError::Detection)?;
    let detected_texts: Vec<String> = detections.iter().map(|d| d.text.clone()).collect();
    debug!("{} text regions detected", detections.len());

    let target_lower = target.to_lowercase();
    let matches: Vec<&Detection> = detections
        .iter()
        .filter(|d| {
            d.text.to_lowercase().contains(&target_lower)
                && config
                    .detector
                    .min_confidence
                    .map_or(true, |floor| d.confidence >= floor)
        })
        .collect();

    let loader = FontLoader::open(&config.font.typeface);
    let replaced_count = apply_matches(&mut buffer, &matches, replacement, config, &loader);

    info!(
        "Edit complete in {:?}: {} of {} detections replaced",
        start.elapsed(),
        replaced_count,
        detections.len()
    );

    Ok(EditOutcome {
        image_png: encode_png(&buffer)?,
        detected_texts,
        replaced_count,
    })
}

/// Compositor: sequential fold over the matches, in detection order,
/// against the one mutable buffer. A later match's background sampling
/// observes pixels already repainted by an earlier match when their
/// neighborhoods overlap; that ordering is part of the contract, so this
/// loop must stay sequential.
fn apply_matches(
    buffer: &mut RgbImage,
    matches: &[&Detection],
    replacement: &str,
    config: &AppConfig,
    loader: &FontLoader,
) -> usize {
    let (width, height) = buffer.dimensions();
    let mut replaced = 0;

    for detection in matches {
        let bounds = detection.bounds(width, height);
        if bounds.is_empty() {
            // Fully outside the image after clamping: idempotent no-op
            debug!("Skipping zero-area match for {:?}", detection.text);
            continue;
        }

        // Fill and glyph color are sampled before the box is erased: the
        // center-pixel heuristic needs the original strokes in place
        let fill = background::reconstruct(buffer, bounds, &config.fill);
        let text_color = color::estimate_text_color(buffer, bounds);

        background::paint(buffer, bounds, &fill);

        let text_fit = fit::fit(bounds, replacement, loader, &config.font);
        loader.draw(
            buffer,
            text_fit.origin.0,
            text_fit.origin.1,
            text_fit.font_size as f32,
            text_color,
            replacement,
        );

        replaced += 1;
    }

    replaced
}

fn encode_png(buffer: &RgbImage) -> Result<Vec<u8>, EditError> {
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(buffer.clone())
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(EditError::ImageEncode)?;
    Ok(png)
}
