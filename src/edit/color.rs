//! Foreground and background color estimation for a detected region.

use image::{Rgb, RgbImage};

use crate::detect::BoundingBox;

/// Glyph color for the replacement text: the pixel at the box center.
///
/// A deliberately cheap single-sample heuristic. It is right when the
/// center lands on a glyph stroke of a large font and wrong (background-
/// colored text) when it lands between strokes. Kept as a named strategy
/// so a modal-color estimate can replace it without touching the rest of
/// the pipeline.
pub fn estimate_text_color(image: &RgbImage, bounds: BoundingBox) -> Rgb<u8> {
    let (width, height) = image.dimensions();
    let (cx, cy) = bounds.center();
    *image.get_pixel(cx.min(width - 1), cy.min(height - 1))
}

/// Representative background color for the region: the flat-fill margin
/// ring mean, independent of which fill strategy is active.
pub fn estimate_background_color(image: &RgbImage, bounds: BoundingBox, margin: u32) -> Rgb<u8> {
    super::background::ring_mean_color(image, bounds, margin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_color_samples_center_pixel() {
        let mut img = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        img.put_pixel(50, 50, Rgb([10, 20, 30]));

        let color = estimate_text_color(&img, BoundingBox::new(20, 20, 80, 80));
        assert_eq!(color, Rgb([10, 20, 30]));
    }

    #[test]
    fn test_text_color_center_on_background_is_background() {
        // The known weakness: a center that misses the glyph strokes
        // yields the background color. Behavior, not a bug.
        let img = RgbImage::from_pixel(100, 100, Rgb([240, 240, 240]));
        let color = estimate_text_color(&img, BoundingBox::new(0, 0, 100, 100));
        assert_eq!(color, Rgb([240, 240, 240]));
    }

    #[test]
    fn test_text_color_clamps_at_edges() {
        let img = RgbImage::from_pixel(10, 10, Rgb([5, 5, 5]));
        // Box hugging the far corner; center computation must stay in bounds
        let color = estimate_text_color(&img, BoundingBox::new(9, 9, 10, 10));
        assert_eq!(color, Rgb([5, 5, 5]));
    }

    #[test]
    fn test_background_color_uses_ring_mean() {
        let mut img = RgbImage::from_pixel(60, 60, Rgb([100, 100, 100]));
        for y in 20..40 {
            for x in 20..40 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }

        let color = estimate_background_color(&img, BoundingBox::new(20, 20, 40, 40), 5);
        assert_eq!(color, Rgb([100, 100, 100]));
    }
}
