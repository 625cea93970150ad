//! Background reconstruction
//!
//! Produces the fill that visually removes the original glyphs from a
//! detected region before the replacement is drawn.

use image::{imageops, Rgb, RgbImage};

use crate::config::{FillSettings, FillStrategy};
use crate::detect::BoundingBox;

/// Pixel data used to overwrite a detected region.
pub enum Fill {
    /// One color for the whole box
    Solid(Rgb<u8>),
    /// A patch with the same dimensions as the box
    Patch(RgbImage),
}

/// Build the reconstruction fill for `bounds` from the current buffer.
///
/// Sampling reads the buffer as-is, so a region repainted by an earlier
/// match is observed by later overlapping matches. That ordering
/// dependency is part of the pipeline contract.
pub fn reconstruct(image: &RgbImage, bounds: BoundingBox, settings: &FillSettings) -> Fill {
    match settings.strategy {
        FillStrategy::Flat => Fill::Solid(ring_mean_color(image, bounds, settings.margin)),
        FillStrategy::Blur => {
            let crop = imageops::crop_imm(
                image,
                bounds.x1,
                bounds.y1,
                bounds.width(),
                bounds.height(),
            )
            .to_image();
            Fill::Patch(imageops::blur(&crop, settings.blur_sigma))
        }
    }
}

/// Mean color of a margin ring around `bounds`, clamped to the image.
///
/// If the clamped ring is empty (the box covers the whole image), the
/// box's own pixels stand in: a self-referential fill that degrades to a
/// near no-op erase rather than failing.
pub fn ring_mean_color(image: &RgbImage, bounds: BoundingBox, margin: u32) -> Rgb<u8> {
    let (width, height) = image.dimensions();

    let outer_x1 = bounds.x1.saturating_sub(margin);
    let outer_y1 = bounds.y1.saturating_sub(margin);
    let outer_x2 = (bounds.x2 + margin).min(width);
    let outer_y2 = (bounds.y2 + margin).min(height);

    let mut sums = [0u64; 3];
    let mut count = 0u64;

    for y in outer_y1..outer_y2 {
        for x in outer_x1..outer_x2 {
            let inside_box =
                x >= bounds.x1 && x < bounds.x2 && y >= bounds.y1 && y < bounds.y2;
            if inside_box {
                continue;
            }
            let pixel = image.get_pixel(x, y);
            for c in 0..3 {
                sums[c] += pixel[c] as u64;
            }
            count += 1;
        }
    }

    if count == 0 {
        // Degenerate case: nothing outside the box to sample
        for y in bounds.y1..bounds.y2.min(height) {
            for x in bounds.x1..bounds.x2.min(width) {
                let pixel = image.get_pixel(x, y);
                for c in 0..3 {
                    sums[c] += pixel[c] as u64;
                }
                count += 1;
            }
        }
    }

    if count == 0 {
        return Rgb([0, 0, 0]);
    }

    Rgb([
        (sums[0] / count) as u8,
        (sums[1] / count) as u8,
        (sums[2] / count) as u8,
    ])
}

/// Paint the fill over `bounds`. Pixels outside the box are untouched.
pub fn paint(image: &mut RgbImage, bounds: BoundingBox, fill: &Fill) {
    let (width, height) = image.dimensions();
    let x2 = bounds.x2.min(width);
    let y2 = bounds.y2.min(height);

    for y in bounds.y1..y2 {
        for x in bounds.x1..x2 {
            let color = match fill {
                Fill::Solid(color) => *color,
                Fill::Patch(patch) => *patch.get_pixel(x - bounds.x1, y - bounds.y1),
            };
            image.put_pixel(x, y, color);
        }
    }
}
