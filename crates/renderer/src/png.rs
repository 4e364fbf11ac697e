//! Byte-level PNG encoding for 8-bit single-channel images.
//!
//! Supports two encoding modes:
//! - **Grayscale (color type 0)**: sample 0 is marked transparent through a
//!   two-byte `tRNS` chunk.
//! - **Indexed (color type 3)**: a `PLTE` chunk plus one `tRNS` alpha byte per
//!   palette entry.
//!
//! Every image carries a `tRNS` chunk. Scanlines use filter type 0 (none)
//! and are zlib-compressed into a single `IDAT` chunk.

use std::io::Write;

use thiserror::Error;

/// The 8-byte PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

const COLOR_TYPE_GRAYSCALE: u8 = 0;
const COLOR_TYPE_INDEXED: u8 = 3;

#[derive(Error, Debug)]
pub enum PngError {
    #[error("pixel buffer holds {actual} samples, expected {expected} for {width}x{height}")]
    SizeMismatch {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("palette must hold 1 to 256 entries, got {0}")]
    InvalidPalette(usize),

    #[error("IDAT compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PngError>;

/// Encode an 8-bit grayscale image. Gray level 0 is transparent.
pub fn encode_grayscale(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    check_size(pixels, width, height)?;

    let mut png = Vec::with_capacity(pixels.len() / 2 + 64);
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, COLOR_TYPE_GRAYSCALE));
    // One 16-bit gray sample
    write_chunk(&mut png, b"tRNS", &[0, 0]);
    write_chunk(&mut png, b"IDAT", &deflate_scanlines(pixels, width, height)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Encode a palette-indexed image.
///
/// `palette` holds `(r, g, b, a)` entries; the alpha of every entry is
/// written to `tRNS`.
pub fn encode_indexed(
    indices: &[u8],
    width: usize,
    height: usize,
    palette: &[(u8, u8, u8, u8)],
) -> Result<Vec<u8>> {
    check_size(indices, width, height)?;
    if palette.is_empty() || palette.len() > 256 {
        return Err(PngError::InvalidPalette(palette.len()));
    }

    let plte: Vec<u8> = palette.iter().flat_map(|(r, g, b, _)| [*r, *g, *b]).collect();
    let trns: Vec<u8> = palette.iter().map(|(_, _, _, a)| *a).collect();

    let mut png = Vec::with_capacity(indices.len() / 2 + plte.len() + trns.len() + 64);
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, COLOR_TYPE_INDEXED));
    write_chunk(&mut png, b"PLTE", &plte);
    write_chunk(&mut png, b"tRNS", &trns);
    write_chunk(&mut png, b"IDAT", &deflate_scanlines(indices, width, height)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn check_size(pixels: &[u8], width: usize, height: usize) -> Result<()> {
    let expected = width * height;
    if pixels.len() != expected {
        return Err(PngError::SizeMismatch {
            width,
            height,
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}

fn ihdr(width: usize, height: usize, color_type: u8) -> [u8; 13] {
    let mut data = [0u8; 13];
    data[0..4].copy_from_slice(&(width as u32).to_be_bytes());
    data[4..8].copy_from_slice(&(height as u32).to_be_bytes());
    data[8] = 8; // bit depth
    data[9] = color_type;
    // compression, filter and interlace methods stay 0
    data
}

/// Write a PNG chunk: length, type, data, CRC32 over type and data.
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Prefix each row with filter byte 0 and deflate.
fn deflate_scanlines(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(height * (1 + width));
    for row in pixels.chunks(width.max(1)).take(height) {
        raw.push(0);
        raw.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

/// Split an encoded PNG into `(type, data)` chunks. Used to inspect output.
pub fn chunks(png: &[u8]) -> Vec<([u8; 4], &[u8])> {
    let mut out = Vec::new();
    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= png.len() {
        let len = u32::from_be_bytes([png[pos], png[pos + 1], png[pos + 2], png[pos + 3]]) as usize;
        let kind = [png[pos + 4], png[pos + 5], png[pos + 6], png[pos + 7]];
        let start = pos + 8;
        if start + len + 4 > png.len() {
            break;
        }
        out.push((kind, &png[start..start + len]));
        pos = start + len + 4;
    }
    out
}
