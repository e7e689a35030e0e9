//! Full-resolution canvas composition
//!
//! The canvas covers the map padded up to a whole number of tiles. Map
//! coordinates have their origin on the bottom edge with Y increasing upward;
//! canvas rows start at the top. Padding rows sit above the map, so the map's
//! bottom edge is always the canvas's bottom edge.

use crate::core::config::TilingConfig;
use crate::core::geo::TileGrid;
use crate::layers::image::ImageSource;
use crate::{Result, TilingError};
use image::imageops::{self, FilterType};
use image::{Rgba, Rgba32FImage, RgbaImage};
use std::borrow::Cow;

/// Resampling filter used for both image scaling and tile halving
pub const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// Builds the full-zoom canvas for a source image.
///
/// The image is resampled when the config carries a scale, then
/// alpha-composited at its placement. Overhang past the canvas is clipped.
pub fn compose_canvas(source: &ImageSource, config: &TilingConfig) -> Result<RgbaImage> {
    config.validate()?;
    let grid = config.tile_grid();
    let mut canvas = RgbaImage::new(grid.pixel_width(), grid.pixel_height());

    let scaled = scale_image(source.image(), config.scale, config.max_canvas_pixels)?;
    let (x, y) = placement_origin(config, &grid, scaled.height());
    log::debug!(
        "placing layer '{}' ({}x{}) at ({}, {}) on {}x{} canvas",
        source.layer_name(),
        scaled.width(),
        scaled.height(),
        x,
        y,
        canvas.width(),
        canvas.height()
    );

    let outside = x >= canvas.width() as i64
        || y >= canvas.height() as i64
        || x.saturating_add(scaled.width() as i64) <= 0
        || y.saturating_add(scaled.height() as i64) <= 0;
    if outside {
        log::warn!(
            "layer '{}' lies entirely outside the map canvas; nothing will be tiled",
            source.layer_name()
        );
        return Ok(canvas);
    }

    imageops::overlay(&mut canvas, &*scaled, x, y);
    Ok(canvas)
}

/// Resamples `image` to `scale` map units per pixel, or borrows it untouched
pub fn scale_image(
    image: &RgbaImage,
    scale: Option<(f64, f64)>,
    max_pixels: u64,
) -> Result<Cow<'_, RgbaImage>> {
    let (scale_x, scale_y) = match scale {
        None => return Ok(Cow::Borrowed(image)),
        Some(scale) => scale,
    };
    if !(scale_x.is_finite() && scale_y.is_finite() && scale_x > 0.0 && scale_y > 0.0) {
        return Err(TilingError::Resample(format!(
            "scale factors must be finite and positive, got ({}, {})",
            scale_x, scale_y
        )));
    }

    let width = (scale_x * image.width() as f64).round();
    let height = (scale_y * image.height() as f64).round();
    if width < 1.0 || height < 1.0 {
        return Err(TilingError::Resample(format!(
            "scaling {}x{} by ({}, {}) leaves no pixels",
            image.width(),
            image.height(),
            scale_x,
            scale_y
        )));
    }
    if width > u32::MAX as f64 || height > u32::MAX as f64 || width * height > max_pixels as f64 {
        return Err(TilingError::CanvasTooLarge {
            width: width as u64,
            height: height as u64,
            limit: max_pixels,
        });
    }

    let (width, height) = (width as u32, height as u32);
    if (width, height) == image.dimensions() {
        return Ok(Cow::Borrowed(image));
    }
    Ok(Cow::Owned(resample(image, width, height)))
}

/// Resizes with [`RESAMPLE_FILTER`] in premultiplied alpha.
///
/// Colour is weighted by opacity while filtering, so transparent neighbours
/// do not bleed black into the edges of content.
pub fn resample(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let premultiplied = Rgba32FImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let alpha = a as f32 / 255.0;
        Rgba([
            r as f32 / 255.0 * alpha,
            g as f32 / 255.0 * alpha,
            b as f32 / 255.0 * alpha,
            alpha,
        ])
    });
    let resized = imageops::resize(&premultiplied, width, height, RESAMPLE_FILTER);

    RgbaImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = resized.get_pixel(x, y).0;
        let alpha = to_channel(a);
        if alpha == 0 {
            return Rgba([0, 0, 0, 0]);
        }
        Rgba([to_channel(r / a), to_channel(g / a), to_channel(b / a), alpha])
    })
}

fn to_channel(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Canvas pixel position of the image's top-left corner.
///
/// With an offset, `(x, y)` is the map position of the image's left and
/// bottom edges, so the canvas row is `(map_height - y) - image_height`
/// shifted down by the padding above the map. Without one the image is
/// top-aligned with the map.
pub fn placement_origin(config: &TilingConfig, grid: &TileGrid, image_height: u32) -> (i64, i64) {
    let top_padding = (grid.pixel_height() - config.map_bounds.height) as i64;
    match config.offset {
        None => (0, top_padding),
        Some((x, y)) => {
            let map_row = (config.map_bounds.height as i64)
                .saturating_sub(y.round() as i64)
                .saturating_sub(image_height as i64);
            (x.round() as i64, map_row.saturating_add(top_padding))
        }
    }
}

/// True when at least one pixel has non-zero alpha
pub fn has_visible_pixels(image: &RgbaImage) -> bool {
    image.pixels().any(|pixel| pixel.0[3] != 0)
}
