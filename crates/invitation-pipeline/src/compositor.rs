//! Invitation image composition
//!
//! Each invitation is the template asset with the guest's QR code pasted in
//! the bottom-left corner and the guest's display name centered in the text
//! box above it.

use std::path::Path;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use invitation_common::{Error, Result};

use crate::text::TextRenderer;

/// Display names are cut to this many characters before rendering
pub const MAX_NAME_CHARS: usize = 20;

/// Font sizes tried from largest to smallest
pub const FONT_SIZES: [f32; 12] = [
    30.0, 29.0, 28.0, 27.0, 26.0, 25.0, 24.0, 23.0, 22.0, 21.0, 20.0, 19.0,
];

/// Rendered name text: `<code>-<name>` cut to [`MAX_NAME_CHARS`]
pub fn display_name(code: i64, name: &str) -> String {
    truncate_chars(&format!("{}-{}", code, name), MAX_NAME_CHARS)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Placement of the barcode and the name on the template
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    /// Barcode footprint after resizing
    pub barcode_width: u32,
    pub barcode_height: u32,

    /// Barcode left edge
    pub barcode_x: i64,

    /// Gap between the barcode's bottom edge and the template's bottom edge
    pub barcode_bottom_margin: i64,

    /// Box the name is centered in
    pub text_box: Rect,

    /// Required clearance on each side of the text inside the box
    pub text_padding: u32,

    pub text_color: Rgb<u8>,

    /// Candidate font sizes, largest first
    pub font_sizes: Vec<f32>,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            barcode_width: 240,
            barcode_height: 191,
            barcode_x: 40,
            barcode_bottom_margin: 63,
            text_box: Rect {
                x: 40,
                y: 1075,
                width: 240,
                height: 105,
            },
            text_padding: 10,
            text_color: Rgb([7, 7, 7]),
            font_sizes: FONT_SIZES.to_vec(),
        }
    }
}

/// Load the background template asset
pub fn load_template(path: &Path) -> Result<RgbImage> {
    let img = image::open(path).map_err(|e| {
        Error::Render(format!(
            "Failed to load template asset {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(img.to_rgb8())
}

/// Composes invitation images
pub struct Compositor {
    layout: Layout,
    renderer: Arc<dyn TextRenderer>,
}

impl Compositor {
    pub fn new(layout: Layout, renderer: Arc<dyn TextRenderer>) -> Self {
        Self { layout, renderer }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Largest candidate size at which `text` fits the text box with padding,
    /// or the smallest candidate when none fits
    pub fn fit_font_size(&self, text: &str) -> f32 {
        let bx = &self.layout.text_box;
        let max_w = bx.width.saturating_sub(2 * self.layout.text_padding);
        let max_h = bx.height.saturating_sub(2 * self.layout.text_padding);

        self.layout
            .font_sizes
            .iter()
            .copied()
            .find(|&size| {
                let (w, h) = self.renderer.text_size(size, text);
                w <= max_w && h <= max_h
            })
            .or_else(|| self.layout.font_sizes.last().copied())
            .unwrap_or(FONT_SIZES[FONT_SIZES.len() - 1])
    }

    /// Paste the barcode and draw the name onto a copy of `template`
    pub fn compose(&self, template: &RgbImage, barcode: &GrayImage, name: &str) -> RgbImage {
        let layout = &self.layout;
        let mut canvas = template.clone();

        let barcode = DynamicImage::ImageLuma8(barcode.clone()).to_rgb8();
        let barcode = imageops::resize(
            &barcode,
            layout.barcode_width,
            layout.barcode_height,
            FilterType::Nearest,
        );
        let barcode_y =
            canvas.height() as i64 - layout.barcode_height as i64 - layout.barcode_bottom_margin;
        imageops::overlay(&mut canvas, &barcode, layout.barcode_x, barcode_y);

        let text = truncate_chars(name, MAX_NAME_CHARS);
        let size = self.fit_font_size(&text);
        let (w, h) = self.renderer.text_size(size, &text);
        let bx = &layout.text_box;
        let x = bx.x + (bx.width as i64 - w as i64) / 2;
        let y = bx.y + (bx.height as i64 - h as i64) / 2;

        self.renderer
            .draw_text(&mut canvas, layout.text_color, x as i32, y as i32, size, &text);

        canvas
    }
}
