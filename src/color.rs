//! Colour parsing, alignment keywords, gradient sampling and unit conversion.

use serde::{Deserialize, Serialize};

pub const MM_TO_PT: f32 = 72.0 / 25.4;
pub const PT_TO_MM: f32 = 25.4 / 72.0;

pub type Rgb = [u8; 3];

pub const BLACK: Rgb = [0, 0, 0];
pub const WHITE: Rgb = [255, 255, 255];

/// Parse `#rrggbb` (or `rrggbb`). Anything else is `None`.
pub fn parse_hex(hex: &str) -> Option<Rgb> {
    let digits = hex.trim().strip_prefix('#').unwrap_or(hex.trim());
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/// Lenient variant used while drawing: malformed input renders black.
pub fn hex_to_rgb(hex: &str) -> Rgb {
    parse_hex(hex).unwrap_or(BLACK)
}

pub(crate) fn unit_rgb(c: Rgb) -> (f32, f32, f32) {
    (c[0] as f32 / 255.0, c[1] as f32 / 255.0, c[2] as f32 / 255.0)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Align {
    /// Unknown keywords map to `Left`.
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "center" => Align::Center,
            "right" => Align::Right,
            "justify" => Align::Justify,
            _ => Align::Left,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

pub const GRADIENT_BANDS: usize = 100;

/// Linear interpolation between two colours, `ratio` in `0.0..=1.0`.
pub fn lerp_rgb(start: Rgb, end: Rgb, ratio: f32) -> Rgb {
    let ratio = ratio.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f32 + ratio * (b as f32 - a as f32)) as u8;
    [
        mix(start[0], end[0]),
        mix(start[1], end[1]),
        mix(start[2], end[2]),
    ]
}

/// One fill band of a gradient, in page millimetres (top-down).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Band {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub color: Rgb,
}

/// Split the page into `GRADIENT_BANDS` bands along `orientation`. Bands
/// overlap by 0.1 mm so no hairline gaps show between them.
pub fn gradient_bands(
    start: Rgb,
    end: Rgb,
    orientation: Orientation,
    page_w: f32,
    page_h: f32,
) -> Vec<Band> {
    (0..GRADIENT_BANDS)
        .map(|i| {
            let ratio = i as f32 / GRADIENT_BANDS as f32;
            let color = lerp_rgb(start, end, ratio);
            match orientation {
                Orientation::Horizontal => {
                    let w = page_w / GRADIENT_BANDS as f32;
                    Band { x: i as f32 * w, y: 0.0, w: w + 0.1, h: page_h, color }
                }
                Orientation::Vertical => {
                    let h = page_h / GRADIENT_BANDS as f32;
                    Band { x: 0.0, y: i as f32 * h, w: page_w, h: h + 0.1, color }
                }
            }
        })
        .collect()
}
