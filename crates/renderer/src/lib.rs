//! Raster rendering for concentration slices.
//!
//! A slice is resampled bilinearly onto a north-up raster whose aspect
//! follows the geographic extent (by coordinate on rectilinear grids), every pixel is coloured by the band its
//! value falls in, and an optional legend strip is appended on the right.
//! The canvas is transparent wherever nothing is drawn.

pub mod bands;
pub mod colorscale;
pub mod error;
pub mod legend;
pub mod png;
pub mod resample;

pub use bands::{band_index, band_levels};
pub use colorscale::{Color, ColorScale};
pub use error::{RenderError, RenderResult};

use std::path::PathBuf;
use std::time::Instant;

use image::{Rgba, RgbaImage};
use rusttype::Font;
use serde::{Deserialize, Serialize};
use tracing::debug;

use grid_dataset::{CoordinateGrid, Slice};

use crate::legend::LEGEND_WIDTH;
use crate::resample::PixelMap;

/// Rendering settings, usually the `render` section of the service config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub color_scale: ColorScale,
    /// Number of filled bands.
    pub level_count: usize,
    /// Raster width in pixels, legend excluded.
    pub width: usize,
    pub legend: bool,
    /// TrueType font for legend labels; the bundled font is used otherwise.
    pub font_path: Option<PathBuf>,
    /// Largest slice (rows * cols) accepted.
    pub max_cells: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            color_scale: ColorScale::Plasma,
            level_count: 20,
            width: 800,
            legend: true,
            font_path: None,
            max_cells: 4_000_000,
        }
    }
}

/// An encoded PNG plus the band edges it was drawn with.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub levels: Vec<f64>,
}

/// Renderer with its font loaded once.
pub struct Renderer {
    options: RenderOptions,
    font: Option<Font<'static>>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("options", &self.options)
            .field("font", &self.font.is_some())
            .finish()
    }
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Self {
        let font = options
            .font_path
            .as_deref()
            .and_then(legend::load_font)
            .or_else(legend::embedded_font);
        Self { options, font }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Render a slice laid out on `grid`; `unit_label` heads the legend.
    pub fn render(&self, slice: &Slice, grid: &CoordinateGrid, unit_label: Option<&str>) -> RenderResult<RenderedImage> {
        let start = Instant::now();
        let opts = &self.options;
        let (rows, cols) = slice.shape();
        let cells = rows * cols;

        if cells == 0 {
            return Err(RenderError::failed("slice is empty"));
        }
        if cells > opts.max_cells {
            return Err(RenderError::GridTooLarge {
                cells,
                limit: opts.max_cells,
            });
        }
        if grid.shape() != (rows, cols) {
            let (gr, gc) = grid.shape();
            return Err(RenderError::failed(format!(
                "slice is {}x{} but coordinates are {}x{}",
                rows, cols, gr, gc
            )));
        }

        let (min, max) = slice
            .range()
            .filter(|(lo, hi)| lo.is_finite() && hi.is_finite())
            .ok_or_else(|| RenderError::failed("slice has no finite values"))?;
        let levels = band_levels(min, max, opts.level_count);
        if levels.is_empty() {
            return Err(RenderError::failed(format!(
                "cannot draw {} bands over constant field {}",
                opts.level_count, min
            )));
        }
        let colors = opts.color_scale.band_colors(opts.level_count);

        let bounds = grid
            .bounds()
            .ok_or_else(|| RenderError::failed("coordinates have no finite values"))?;
        let (map_w, map_h) = resample::output_size(&bounds, opts.width, rows, cols);
        let values = resample::resample(slice, &PixelMap::for_grid(grid, &bounds, map_w, map_h));

        let with_legend = opts.legend && map_h as u32 >= legend::MIN_LEGEND_HEIGHT;
        let canvas_w = map_w as u32 + if with_legend { LEGEND_WIDTH } else { 0 };
        let mut canvas = RgbaImage::new(canvas_w, map_h as u32);

        for (idx, &value) in values.iter().enumerate() {
            // bilinear output stays within the slice range up to rounding
            if let Some(band) = band_index(value.clamp(min, max), &levels) {
                let (x, y) = ((idx % map_w) as u32, (idx / map_w) as u32);
                canvas.put_pixel(x, y, Rgba(colors[band].to_rgba()));
            }
        }

        if with_legend {
            legend::draw_legend(&mut canvas, map_w as u32, &levels, &colors, unit_label, self.font.as_ref());
        }

        let (width, height) = canvas.dimensions();
        let png = png::encode_auto(canvas.as_raw(), width as usize, height as usize)?;

        debug!(
            rows,
            cols,
            width,
            height,
            bytes = png.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Rendered slice"
        );

        Ok(RenderedImage {
            png,
            width,
            height,
            levels,
        })
    }
}

/// One-shot render with the given options.
pub fn render(
    slice: &Slice,
    grid: &CoordinateGrid,
    options: &RenderOptions,
    unit_label: Option<&str>,
) -> RenderResult<RenderedImage> {
    Renderer::new(options.clone()).render(slice, grid, unit_label)
}
