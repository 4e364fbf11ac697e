//! Tests for PNG encoding against a standard decoder.
//!
//! Covers:
//! - Grayscale and indexed round trips through the `image` crate
//! - tRNS chunk sizes per mode
//! - Masked pixels rendering transparent

use image::ImageFormat;
use renderer::png::chunks;
use renderer::{encode_grayscale, encode_indexed, render_png, Palette, RenderStyle, Scaling};
use serde_json::json;

// ============================================================================
// Helper functions
// ============================================================================

fn trns_len(png: &[u8]) -> usize {
    chunks(png)
        .into_iter()
        .find(|(kind, _)| kind == b"tRNS")
        .map(|(_, data)| data.len())
        .expect("tRNS chunk present")
}

fn decode(png: &[u8]) -> image::DynamicImage {
    image::load_from_memory_with_format(png, ImageFormat::Png).expect("valid PNG")
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_grayscale_round_trip() {
    let pixels = [0u8, 17, 200, 255];
    let png = encode_grayscale(&pixels, 2, 2).unwrap();

    let img = decode(&png);
    assert_eq!((img.width(), img.height()), (2, 2));

    let luma = img.to_luma_alpha8();
    let values: Vec<u8> = luma.pixels().map(|p| p.0[0]).collect();
    assert_eq!(values, pixels);

    // Gray level 0 is the transparent sample
    let alpha: Vec<u8> = luma.pixels().map(|p| p.0[1]).collect();
    assert_eq!(alpha, vec![0, 255, 255, 255]);
    assert_eq!(trns_len(&png), 2);
}

#[test]
fn test_indexed_round_trip() {
    let mut palette = vec![(0u8, 0u8, 0u8, 255u8); 256];
    palette[0] = (0, 0, 0, 0);
    palette[1] = (255, 0, 0, 255);
    palette[2] = (0, 0, 255, 128);

    let png = encode_indexed(&[1, 2, 0, 1], 2, 2, &palette).unwrap();
    assert_eq!(trns_len(&png), 256);

    let rgba = decode(&png).to_rgba8();
    let px: Vec<[u8; 4]> = rgba.pixels().map(|p| p.0).collect();
    assert_eq!(
        px,
        vec![[255, 0, 0, 255], [0, 0, 255, 128], [0, 0, 0, 0], [255, 0, 0, 255]]
    );
}

#[test]
fn test_wide_image_rows() {
    let width = 300;
    let height = 3;
    let pixels: Vec<u8> = (0..width * height).map(|i| (i % 251) as u8).collect();
    let png = encode_grayscale(&pixels, width, height).unwrap();
    let luma = decode(&png).to_luma_alpha8();
    let values: Vec<u8> = luma.pixels().map(|p| p.0[0]).collect();
    assert_eq!(values, pixels);
}

// ============================================================================
// Rendering styles
// ============================================================================

#[test]
fn test_render_legend_masks_to_index_zero() {
    let legend = json!({"1": ["Land", "#00FF00"], "2": ["Water", 0x000000FFu32]});
    let style = RenderStyle::Legend(Palette::from_legend(&legend).unwrap());

    let png = render_png(&[1.0, 2.0, 2.0, 1.0], &[false, false, true, false], 2, 2, &style).unwrap();
    let rgba = decode(&png).to_rgba8();
    assert_eq!(rgba.get_pixel(0, 0).0, [0, 255, 0, 255]);
    assert_eq!(rgba.get_pixel(1, 0).0, [0, 0, 255, 255]);
    assert_eq!(rgba.get_pixel(0, 1).0[3], 0);
}

#[test]
fn test_render_grayscale_with_scaling() {
    let style = RenderStyle::Grayscale(Some(Scaling::new(0.0, 10.0)));
    let png = render_png(&[0.0, 5.0, 10.0, 20.0], &[false; 4], 2, 2, &style).unwrap();
    let luma = decode(&png).to_luma_alpha8();
    let values: Vec<u8> = luma.pixels().map(|p| p.0[0]).collect();
    assert_eq!(values, vec![1, 128, 255, 255]);
}

#[test]
fn test_render_grayscale_data_range() {
    let style = RenderStyle::Grayscale(None);
    let png = render_png(&[2.0, 4.0, f64::NAN, 3.0], &[false, false, true, false], 2, 2, &style)
        .unwrap();
    let luma = decode(&png).to_luma_alpha8();
    let values: Vec<u8> = luma.pixels().map(|p| p.0[0]).collect();
    assert_eq!(values, vec![1, 255, 0, 128]);
}
