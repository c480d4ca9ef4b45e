//! Text measuring and drawing for invitation names

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use invitation_common::{Error, Result};
use tracing::info;

/// Measures and draws single-line text at a pixel size
pub trait TextRenderer: Send + Sync {
    /// Width and height of `text` rendered at `size` pixels
    fn text_size(&self, size: f32, text: &str) -> (u32, u32);

    /// Draw `text` with its top-left corner at (`x`, `y`)
    fn draw_text(&self, canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, size: f32, text: &str);
}

/// TrueType/OpenType font renderer
pub struct FontRenderer {
    font: FontVec,
}

impl FontRenderer {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| Error::Render(format!("Invalid font data: {}", e)))?;
        Ok(Self { font })
    }

    /// Load a font file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::Render(format!("Failed to read font {}: {}", path.display(), e))
        })?;
        let renderer = Self::from_bytes(bytes)?;
        info!("Loaded font from {}", path.display());
        Ok(renderer)
    }
}

impl TextRenderer for FontRenderer {
    fn text_size(&self, size: f32, text: &str) -> (u32, u32) {
        text_size(PxScale::from(size), &self.font, text)
    }

    fn draw_text(&self, canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, size: f32, text: &str) {
        draw_text_mut(canvas, color, x, y, PxScale::from(size), &self.font, text);
    }
}
