//! PNG rendering of single-band rasters.
//!
//! Implements two rendering styles:
//! - Legend palettes, where pixel values are class indices
//! - Linear grayscale between a min/max scaling

pub mod palette;
pub mod png;
pub mod scale;

pub use palette::{Color, Palette, PaletteError, PALETTE_SIZE};
pub use png::{encode_grayscale, encode_indexed, PngError};
pub use scale::{to_class_indices, to_gray_levels, Scaling};

/// How a band is turned into pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderStyle {
    Legend(Palette),
    /// `None` scales over the valid data range.
    Grayscale(Option<Scaling>),
}

/// Render one band of `width * height` values. Masked pixels are
/// transparent.
pub fn render_png(
    values: &[f64],
    mask: &[bool],
    width: usize,
    height: usize,
    style: &RenderStyle,
) -> png::Result<Vec<u8>> {
    match style {
        RenderStyle::Legend(palette) => {
            let indices = to_class_indices(values, mask);
            encode_indexed(&indices, width, height, &palette.entries())
        }
        RenderStyle::Grayscale(scaling) => {
            let scaling = scaling
                .or_else(|| Scaling::from_data(values, mask))
                .unwrap_or(Scaling::new(0.0, 1.0));
            let levels = to_gray_levels(values, mask, scaling);
            encode_grayscale(&levels, width, height)
        }
    }
}
