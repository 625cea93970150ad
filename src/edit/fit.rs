//! Text fitting and font loading
//!
//! Chooses the font size and origin that make the replacement string
//! occupy the original detection box, shrinking until the rendered width
//! fits or the size floor is reached.

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use std::path::Path;
use tracing::{debug, warn};

use super::bitmap_font;
use crate::config::FontSettings;
use crate::detect::BoundingBox;

/// Well-known locations for a bold face, tried after the configured path.
const SYSTEM_FALLBACKS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

enum Face {
    TrueType(FontVec),
    /// Built-in 5x7 bitmap font; sizing accuracy is degraded by design
    Builtin,
}

/// Loads the replacement typeface once; measuring and drawing scale it
/// per fit iteration. Absence of every TrueType candidate is non-fatal
/// and reported through the degraded flag.
pub struct FontLoader {
    face: Face,
    degraded: bool,
}

impl FontLoader {
    /// Try the configured typeface, then system fallbacks, then the
    /// built-in bitmap font.
    pub fn open(typeface: &Path) -> Self {
        if let Some(font) = Self::try_load(typeface) {
            return Self {
                face: Face::TrueType(font),
                degraded: false,
            };
        }

        for candidate in SYSTEM_FALLBACKS {
            if let Some(font) = Self::try_load(Path::new(candidate)) {
                debug!("Typeface {:?} unavailable, using {}", typeface, candidate);
                return Self {
                    face: Face::TrueType(font),
                    degraded: true,
                };
            }
        }

        warn!(
            "No TrueType face found (tried {:?} and system locations), \
             falling back to the built-in bitmap font",
            typeface
        );
        Self {
            face: Face::Builtin,
            degraded: true,
        }
    }

    /// Loader that always uses the built-in bitmap font. Deterministic
    /// regardless of installed system fonts.
    pub fn builtin() -> Self {
        Self {
            face: Face::Builtin,
            degraded: true,
        }
    }

    fn try_load(path: &Path) -> Option<FontVec> {
        let bytes = std::fs::read(path).ok()?;
        FontVec::try_from_vec(bytes).ok()
    }

    /// Whether rendering fell back past the configured typeface.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Rendered width of `text` at `size`, in pixels.
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        match &self.face {
            Face::TrueType(font) => {
                let scaled = font.as_scaled(PxScale::from(size));
                let mut width = 0.0;
                let mut prev = None;
                for c in text.chars() {
                    let id = font.glyph_id(c);
                    if let Some(prev_id) = prev {
                        width += scaled.kern(prev_id, id);
                    }
                    width += scaled.h_advance(id);
                    prev = Some(id);
                }
                width
            }
            Face::Builtin => bitmap_font::measure(text, size),
        }
    }

    /// Draw `text` with its top-left corner at `(x, y)`.
    pub fn draw(&self, image: &mut RgbImage, x: i64, y: i64, size: f32, color: Rgb<u8>, text: &str) {
        match &self.face {
            Face::TrueType(font) => {
                draw_text_mut(image, color, x as i32, y as i32, PxScale::from(size), font, text);
            }
            Face::Builtin => bitmap_font::draw(image, x, y, size, color, text),
        }
    }
}

/// Size and placement for a replacement string.
#[derive(Debug, Clone, Copy)]
pub struct TextFit {
    pub font_size: u32,
    pub origin: (i64, i64),
}

/// Fit `text` into `bounds`: start at the box height (floored at the
/// minimum size), shrink by the configured step while the rendered width
/// exceeds the box width. Linear and monotonic, so it terminates in at
/// most `(initial - floor) / step + 1` iterations. An empty string is a
/// valid degenerate fit with zero width.
pub fn fit(bounds: BoundingBox, text: &str, loader: &FontLoader, settings: &FontSettings) -> TextFit {
    let floor = settings.min_size.max(1);
    let step = settings.shrink_step.max(1);

    let mut size = bounds.height().max(floor);
    let mut width = loader.measure(text, size as f32);

    while width > bounds.width() as f32 && size > floor {
        size = size.saturating_sub(step).max(floor);
        width = loader.measure(text, size as f32);
    }

    let origin_x = bounds.x1 as i64 + ((bounds.width() as f32 - width) / 2.0).round() as i64;
    let origin_y = bounds.y1 as i64 + (bounds.height() as i64 - size as i64) / 2;

    TextFit {
        font_size: size,
        origin: (origin_x, origin_y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> FontSettings {
        FontSettings::default()
    }

    #[test]
    fn test_fit_wide_box_keeps_box_height() {
        let loader = FontLoader::builtin();
        let result = fit(BoundingBox::new(20, 40, 120, 70), "Hi", &loader, &settings());
        // "Hi" at size 30 is 2 * 6 * (30/7) ~= 51px, fits in 100
        assert_eq!(result.font_size, 30);
    }

    #[test]
    fn test_fit_shrinks_until_width_fits() {
        let loader = FontLoader::builtin();
        let bounds = BoundingBox::new(0, 0, 80, 60);
        let result = fit(bounds, "LONGER TEXT", &loader, &settings());

        assert!(result.font_size >= 10);
        let width = loader.measure("LONGER TEXT", result.font_size as f32);
        assert!(width <= 80.0 || result.font_size == 10);
    }

    #[test]
    fn test_fit_floor_reached_on_narrow_box() {
        let loader = FontLoader::builtin();
        let bounds = BoundingBox::new(0, 0, 8, 50);
        let result = fit(bounds, "WWWWWWWWWW", &loader, &settings());
        // Cannot fit at any size; stops at the floor instead of looping
        assert_eq!(result.font_size, 10);
    }

    #[test]
    fn test_fit_short_box_clamps_to_floor() {
        let loader = FontLoader::builtin();
        let bounds = BoundingBox::new(0, 0, 100, 4);
        let result = fit(bounds, "A", &loader, &settings());
        assert_eq!(result.font_size, 10);
    }

    #[test]
    fn test_fit_empty_text() {
        let loader = FontLoader::builtin();
        let bounds = BoundingBox::new(10, 10, 60, 40);
        let result = fit(bounds, "", &loader, &settings());

        assert_eq!(result.font_size, 30);
        // Zero width centers on the box midline
        assert_eq!(result.origin.0, 35);
        assert_eq!(result.origin.1, 10);
    }

    #[test]
    fn test_fit_origin_centered() {
        let loader = FontLoader::builtin();
        let bounds = BoundingBox::new(20, 40, 120, 70);
        let result = fit(bounds, "AB", &loader, &settings());

        let width = loader.measure("AB", result.font_size as f32);
        let expected_x = 20 + ((100.0 - width) / 2.0).round() as i64;
        assert_eq!(result.origin.0, expected_x);
        assert_eq!(result.origin.1, 40 + (30 - result.font_size as i64) / 2);
    }

    #[test]
    fn test_builtin_loader_is_degraded() {
        assert!(FontLoader::builtin().is_degraded());
    }

    #[test]
    fn test_missing_typeface_never_panics() {
        let loader = FontLoader::open(Path::new("/definitely/not/a/font.ttf"));
        // Whatever backend it found, measuring must work
        assert!(loader.measure("x", 20.0) >= 0.0);
    }
}
