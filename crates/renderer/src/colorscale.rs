//! Perceptually uniform colour scales for concentration bands.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Opaque colour from `0xRRGGBB`.
    pub const fn from_hex(rgb: u32) -> Self {
        Self::new((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255)
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

fn interpolate_color(c1: Color, c2: Color, t: f64) -> Color {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    Color::new(mix(c1.r, c2.r), mix(c1.g, c2.g), mix(c1.b, c2.b), mix(c1.a, c2.a))
}

// Ten evenly spaced anchors sampled from the matplotlib colormaps.
const PLASMA: [u32; 10] = [
    0x0d0887, 0x41049d, 0x6a00a8, 0x8f0da4, 0xb12a90, 0xcc4778, 0xe16462, 0xf2844b, 0xfca636, 0xf0f921,
];
const VIRIDIS: [u32; 10] = [
    0x440154, 0x482878, 0x3e4989, 0x31688e, 0x26828e, 0x1f9e89, 0x35b779, 0x6ece58, 0xb5de2b, 0xfde725,
];
const INFERNO: [u32; 10] = [
    0x000004, 0x1b0c41, 0x4a0c6b, 0x781c6d, 0xa52c60, 0xcf4446, 0xed6925, 0xfb9b06, 0xf7d13d, 0xfcffa4,
];
const MAGMA: [u32; 10] = [
    0x000004, 0x180f3d, 0x440f76, 0x721f81, 0x9e2f7f, 0xcd4071, 0xf1605d, 0xfd9668, 0xfeca8d, 0xfcfdbf,
];

/// Named colour scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScale {
    #[default]
    Plasma,
    Viridis,
    Inferno,
    Magma,
}

impl ColorScale {
    pub const ALL: [ColorScale; 4] = [
        ColorScale::Plasma,
        ColorScale::Viridis,
        ColorScale::Inferno,
        ColorScale::Magma,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ColorScale::Plasma => "plasma",
            ColorScale::Viridis => "viridis",
            ColorScale::Inferno => "inferno",
            ColorScale::Magma => "magma",
        }
    }

    fn anchors(&self) -> &'static [u32] {
        match self {
            ColorScale::Plasma => &PLASMA,
            ColorScale::Viridis => &VIRIDIS,
            ColorScale::Inferno => &INFERNO,
            ColorScale::Magma => &MAGMA,
        }
    }

    /// Colour at position `t` in `[0, 1]`; out-of-range positions clamp.
    pub fn sample(&self, t: f64) -> Color {
        let anchors = self.anchors();
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let pos = t * (anchors.len() - 1) as f64;
        let lo = (pos.floor() as usize).min(anchors.len() - 2);
        interpolate_color(Color::from_hex(anchors[lo]), Color::from_hex(anchors[lo + 1]), pos - lo as f64)
    }

    /// One colour per band, low to high, spanning the whole scale.
    pub fn band_colors(&self, bands: usize) -> Vec<Color> {
        match bands {
            0 => Vec::new(),
            1 => vec![self.sample(0.5)],
            n => (0..n).map(|k| self.sample(k as f64 / (n - 1) as f64)).collect(),
        }
    }
}

impl fmt::Display for ColorScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorScale::ALL
            .into_iter()
            .find(|scale| scale.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown colour scale '{}'", s))
    }
}
