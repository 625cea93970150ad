//! Built-in fallback rasterizer font
//!
//! Fixed 5x7 glyph grid covering digits, uppercase letters and common
//! punctuation; lowercase input folds to uppercase. Used only when no
//! TrueType face can be found, trading fidelity for a guaranteed render.

use image::{Rgb, RgbImage};

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;
/// Columns advanced per character (glyph plus one column of spacing)
pub const GLYPH_ADVANCE: u32 = 6;

/// Rows are 5-bit patterns, most significant bit leftmost.
type Glyph = [u8; 7];

/// Look up the glyph for a character, folding lowercase to uppercase.
/// Characters outside the table render as blank space.
pub fn glyph(c: char) -> Option<&'static Glyph> {
    let c = c.to_ascii_uppercase();
    let glyph = match c {
        '0' => &[0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => &[0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => &[0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => &[0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => &[0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => &[0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => &[0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => &[0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => &[0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => &[0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'A' => &[0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => &[0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => &[0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => &[0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => &[0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => &[0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => &[0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => &[0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => &[0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => &[0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => &[0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => &[0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => &[0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => &[0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => &[0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => &[0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => &[0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => &[0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => &[0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => &[0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => &[0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => &[0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => &[0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => &[0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => &[0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => &[0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '.' => &[0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        ',' => &[0b00000, 0b00000, 0b00000, 0b00000, 0b00110, 0b00100, 0b01000],
        '!' => &[0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100],
        '?' => &[0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
        '\'' => &[0b00100, 0b00100, 0b01000, 0b00000, 0b00000, 0b00000, 0b00000],
        '-' => &[0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        ':' => &[0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '&' => &[0b01100, 0b10010, 0b10100, 0b01000, 0b10101, 0b10010, 0b01101],
        _ => return None,
    };
    Some(glyph)
}

/// Rendered width of `text` at the given font size in pixels.
pub fn measure(text: &str, size: f32) -> f32 {
    let cell = size / GLYPH_HEIGHT as f32;
    text.chars().count() as f32 * GLYPH_ADVANCE as f32 * cell
}

/// Draw `text` with the top-left corner at `(x, y)`, nearest-neighbor
/// scaled so the glyph grid spans the font size vertically.
pub fn draw(image: &mut RgbImage, x: i64, y: i64, size: f32, color: Rgb<u8>, text: &str) {
    let (img_w, img_h) = image.dimensions();
    let cell = size / GLYPH_HEIGHT as f32;
    let mut pen_x = x as f32;

    for c in text.chars() {
        if let Some(rows) = glyph(c) {
            let glyph_w = (GLYPH_WIDTH as f32 * cell).ceil() as i64;
            let glyph_h = (GLYPH_HEIGHT as f32 * cell).ceil() as i64;

            for dy in 0..glyph_h {
                for dx in 0..glyph_w {
                    let src_col = (dx as f32 / cell) as usize;
                    let src_row = (dy as f32 / cell) as usize;
                    if src_col >= GLYPH_WIDTH as usize || src_row >= GLYPH_HEIGHT as usize {
                        continue;
                    }
                    if rows[src_row] & (1 << (GLYPH_WIDTH as usize - 1 - src_col)) == 0 {
                        continue;
                    }

                    let px = pen_x as i64 + dx;
                    let py = y + dy;
                    if px >= 0 && py >= 0 && (px as u32) < img_w && (py as u32) < img_h {
                        image.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }
        pen_x += GLYPH_ADVANCE as f32 * cell;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph_lookup_and_case_fold() {
        assert!(glyph('A').is_some());
        assert_eq!(glyph('a'), glyph('A'));
        assert!(glyph('7').is_some());
        assert!(glyph('\u{00e9}').is_none());
    }

    #[test]
    fn test_measure_scales_linearly() {
        let narrow = measure("AB", 7.0);
        let wide = measure("AB", 14.0);
        assert_eq!(narrow, 12.0);
        assert_eq!(wide, 24.0);
    }

    #[test]
    fn test_measure_empty() {
        assert_eq!(measure("", 20.0), 0.0);
    }

    #[test]
    fn test_draw_marks_pixels() {
        let mut img = RgbImage::from_pixel(40, 20, Rgb([255, 255, 255]));
        draw(&mut img, 2, 2, 14.0, Rgb([0, 0, 0]), "T");

        let dark = img.pixels().filter(|p| p[0] == 0).count();
        assert!(dark > 0, "glyph must set some pixels");
    }

    #[test]
    fn test_draw_clips_at_image_bounds() {
        // Drawing partially off-canvas must not panic
        let mut img = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        draw(&mut img, -3, -3, 14.0, Rgb([0, 0, 0]), "MM");
        draw(&mut img, 8, 8, 14.0, Rgb([0, 0, 0]), "MM");
    }
}
