//! Legend colour palettes.
//!
//! A legend maps class values to `[label, colour]` pairs. Colours are
//! either an integer `0xTTRRGGBB` or a `#RRGGBB` / `#TTRRGGBB` string, where
//! `TT` is transparency: `0x00` is opaque and alpha is `255 - TT`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Number of entries in an 8-bit palette.
pub const PALETTE_SIZE: usize = 256;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaletteError {
    #[error("legend key '{0}' is not a class index in 0..=255")]
    InvalidIndex(String),

    #[error("legend entry {0} must be [label, colour]")]
    InvalidEntry(String),

    #[error("invalid legend colour {0}")]
    InvalidColor(String),

    #[error("legend must be a mapping")]
    NotAMapping,
}

/// An RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Decode `0xTTRRGGBB`.
    pub fn from_packed(value: u32) -> Self {
        Self {
            r: (value >> 16) as u8,
            g: (value >> 8) as u8,
            b: value as u8,
            a: 255 - (value >> 24) as u8,
        }
    }

    /// Parse a legend colour value.
    pub fn from_value(value: &Value) -> Result<Self, PaletteError> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .map(Self::from_packed)
                .ok_or_else(|| PaletteError::InvalidColor(n.to_string())),
            Value::String(s) => Self::from_hex(s),
            other => Err(PaletteError::InvalidColor(other.to_string())),
        }
    }

    /// Parse `#RRGGBB` or `#TTRRGGBB`.
    pub fn from_hex(s: &str) -> Result<Self, PaletteError> {
        let hex = s.trim().trim_start_matches('#');
        let hex = hex
            .strip_prefix("0x")
            .or_else(|| hex.strip_prefix("0X"))
            .unwrap_or(hex);
        if hex.len() != 6 && hex.len() != 8 {
            return Err(PaletteError::InvalidColor(s.to_string()));
        }
        u32::from_str_radix(hex, 16)
            .map(Self::from_packed)
            .map_err(|_| PaletteError::InvalidColor(s.to_string()))
    }

    pub fn rgba(&self) -> (u8, u8, u8, u8) {
        (self.r, self.g, self.b, self.a)
    }
}

/// A full 256-entry palette built from a legend.
///
/// Unlisted classes are black and fully opaque, except that index 0 is
/// reserved for masked pixels when the legend does not define it.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: Vec<Color>,
    labels: BTreeMap<u8, String>,
}

impl Palette {
    /// Build from a legend mapping `{index: [label, colour]}`.
    pub fn from_legend(legend: &Value) -> Result<Self, PaletteError> {
        let entries = legend.as_object().ok_or(PaletteError::NotAMapping)?;

        let mut colors = vec![
            Color {
                a: 255,
                ..Default::default()
            };
            PALETTE_SIZE
        ];
        colors[0] = Color::default();
        let mut labels = BTreeMap::new();

        for (key, entry) in entries {
            let index: u8 = key
                .trim()
                .parse()
                .map_err(|_| PaletteError::InvalidIndex(key.clone()))?;
            let (label, color) = match entry.as_array().map(Vec::as_slice) {
                Some([label, color, ..]) => (label, color),
                _ => return Err(PaletteError::InvalidEntry(key.clone())),
            };
            colors[index as usize] = Color::from_value(color)?;
            let label = match label {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            labels.insert(index, label);
        }

        Ok(Self { colors, labels })
    }

    pub fn color(&self, index: u8) -> Color {
        self.colors[index as usize]
    }

    pub fn label(&self, index: u8) -> Option<&str> {
        self.labels.get(&index).map(String::as_str)
    }

    /// Entries as `(r, g, b, a)` for the PNG encoder.
    pub fn entries(&self) -> Vec<(u8, u8, u8, u8)> {
        self.colors.iter().map(Color::rgba).collect()
    }
}
