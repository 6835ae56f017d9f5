//! Vertical colour legend drawn beside the raster.

use std::path::Path;

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use tracing::warn;

use crate::bands::format_level;
use crate::colorscale::Color;

/// Width of the legend strip in pixels.
pub const LEGEND_WIDTH: u32 = 96;

/// Maps shorter than this get no legend.
pub const MIN_LEGEND_HEIGHT: u32 = 64;

const BAR_X: i32 = 8;
const BAR_WIDTH: u32 = 18;
const MARGIN_TOP: u32 = 22;
const MARGIN_BOTTOM: u32 = 8;
const FONT_SIZE: f32 = 12.0;
const MIN_LABEL_SPACING: f32 = 14.0;
const INK: Rgba<u8> = Rgba([40, 40, 40, 255]);

/// Embedded font data - DejaVu Sans Mono
const FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

/// The bundled legend font.
pub fn embedded_font() -> Option<Font<'static>> {
    Font::try_from_bytes(FONT_DATA)
}

/// Load a TrueType font from disk.
pub fn load_font(path: &Path) -> Option<Font<'static>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Legend font unavailable");
            return None;
        }
    };
    let font = Font::try_from_vec(bytes);
    if font.is_none() {
        warn!(path = %path.display(), "Legend font could not be parsed");
    }
    font
}

/// Draw the legend into the strip starting at column `x0`.
///
/// `levels` holds the band edges, `colors` one colour per band.
pub fn draw_legend(
    canvas: &mut RgbaImage,
    x0: u32,
    levels: &[f64],
    colors: &[Color],
    unit_label: Option<&str>,
    font: Option<&Font<'_>>,
) {
    let height = canvas.height();
    let bands = colors.len();
    if bands == 0 || levels.len() != bands + 1 || height < MIN_LEGEND_HEIGHT {
        return;
    }

    let bar_top = MARGIN_TOP as f32;
    let bar_height = (height - MARGIN_TOP - MARGIN_BOTTOM) as f32;
    let band_height = bar_height / bands as f32;
    let bar_x = x0 as i32 + BAR_X;
    let edge_y = |k: usize| bar_top + bar_height - band_height * k as f32;

    // lowest band at the bottom
    for (k, color) in colors.iter().enumerate() {
        let top = edge_y(k + 1).round() as i32;
        let bottom = edge_y(k).round() as i32;
        let rect = Rect::at(bar_x, top).of_size(BAR_WIDTH, (bottom - top).max(1) as u32);
        draw_filled_rect_mut(canvas, rect, Rgba(color.to_rgba()));
    }

    let label_step = ((MIN_LABEL_SPACING / band_height).ceil() as usize).max(1);
    let tick_x = (bar_x + BAR_WIDTH as i32) as f32;
    let scale = Scale::uniform(FONT_SIZE);

    for k in (0..=bands).step_by(label_step) {
        let y = edge_y(k);
        draw_line_segment_mut(canvas, (tick_x, y), (tick_x + 4.0, y), INK);
        if let Some(font) = font {
            let text = format_level(levels[k]);
            let text_y = (y - FONT_SIZE / 2.0).round() as i32;
            draw_text_mut(canvas, INK, tick_x as i32 + 6, text_y, scale, font, &text);
        }
    }

    if let (Some(font), Some(unit)) = (font, unit_label) {
        draw_text_mut(canvas, INK, bar_x, 4, scale, font, unit);
    }
}
