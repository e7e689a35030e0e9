//! Configuration for a single tiling run
//!
//! A `TilingConfig` describes one image layer being tiled into one map:
//! the map geometry, where and at what scale the image sits on the map, which
//! zoom levels are persisted and how tile-write failures are handled.

use crate::core::bounds::MapBounds;
use crate::core::constants::{DEFAULT_MAX_CANVAS_PIXELS, TILE_SIZE};
use crate::core::geo::TileGrid;
use crate::{Result, TilingError};
use serde::{Deserialize, Serialize};

/// Inclusive range of zoom levels to persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: u8,
    pub max: u8,
}

impl ZoomRange {
    pub fn new(min: u8, max: u8) -> Result<Self> {
        if min > max {
            return Err(TilingError::Config(format!(
                "invalid zoom range: min {} is greater than max {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, zoom: u8) -> bool {
        zoom >= self.min && zoom <= self.max
    }
}

/// What to do when the tile sink fails to persist a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteFailurePolicy {
    /// Stop the run and return the first failure
    Abort,
    /// Log the failure, count it and keep tiling
    SkipAndLog,
}

impl Default for WriteFailurePolicy {
    fn default() -> Self {
        Self::Abort
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilingConfig {
    pub map_id: String,
    pub map_bounds: MapBounds,
    pub layer_name: String,
    pub tile_size: u32,
    /// Map units per source pixel (X, Y). `None` keeps native pixel size.
    pub scale: Option<(f64, f64)>,
    /// Map position of the image's left and bottom edges. `None` top-aligns
    /// the image with the map.
    pub offset: Option<(f64, f64)>,
    pub zoom_range: Option<ZoomRange>,
    pub write_failure_policy: WriteFailurePolicy,
    /// Tile each level on the worker pool (needs the `parallel` feature)
    pub parallel: bool,
    pub max_canvas_pixels: u64,
}

impl TilingConfig {
    pub fn new(map_id: impl Into<String>, map_bounds: MapBounds, layer_name: impl Into<String>) -> Self {
        Self {
            map_id: map_id.into(),
            map_bounds,
            layer_name: layer_name.into(),
            tile_size: TILE_SIZE,
            scale: None,
            offset: None,
            zoom_range: None,
            write_failure_policy: WriteFailurePolicy::default(),
            parallel: cfg!(feature = "parallel"),
            max_canvas_pixels: DEFAULT_MAX_CANVAS_PIXELS,
        }
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_scale(mut self, x: f64, y: f64) -> Self {
        self.scale = Some((x, y));
        self
    }

    pub fn with_offset(mut self, x: f64, y: f64) -> Self {
        self.offset = Some((x, y));
        self
    }

    pub fn with_zoom_range(mut self, zoom_range: ZoomRange) -> Self {
        self.zoom_range = Some(zoom_range);
        self
    }

    pub fn with_write_failure_policy(mut self, policy: WriteFailurePolicy) -> Self {
        self.write_failure_policy = policy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_max_canvas_pixels(mut self, max_canvas_pixels: u64) -> Self {
        self.max_canvas_pixels = max_canvas_pixels;
        self
    }

    /// Full-zoom tile grid of the map
    pub fn tile_grid(&self) -> TileGrid {
        self.map_bounds.tile_grid(self.tile_size)
    }

    pub fn full_zoom(&self) -> u8 {
        self.tile_grid().full_zoom()
    }

    /// Whether tiles at `zoom` are handed to the sink
    pub fn persists_zoom(&self, zoom: u8) -> bool {
        self.zoom_range.map_or(true, |range| range.contains(zoom))
    }

    /// Checks the whole configuration before any buffer is allocated
    pub fn validate(&self) -> Result<()> {
        if self.map_id.is_empty() {
            return Err(TilingError::Config("map id must not be empty".into()));
        }
        validate_layer_name(&self.layer_name)?;
        if self.map_bounds.width == 0 || self.map_bounds.height == 0 {
            return Err(TilingError::Config(format!(
                "map bounds must be positive, got {}x{}",
                self.map_bounds.width, self.map_bounds.height
            )));
        }
        if self.tile_size == 0 || self.tile_size % 2 != 0 {
            return Err(TilingError::Config(format!(
                "tile size must be a positive even number of pixels, got {}",
                self.tile_size
            )));
        }
        if let Some(range) = self.zoom_range {
            ZoomRange::new(range.min, range.max)?;
        }
        if let Some((x, y)) = self.scale {
            if !(x.is_finite() && y.is_finite() && x > 0.0 && y > 0.0) {
                return Err(TilingError::Resample(format!(
                    "scale factors must be finite and positive, got ({}, {})",
                    x, y
                )));
            }
        }
        if let Some((x, y)) = self.offset {
            if !(x.is_finite() && y.is_finite()) {
                return Err(TilingError::InvalidPlacement(format!(
                    "offset must be finite, got ({}, {})",
                    x, y
                )));
            }
        }

        let grid = self.tile_grid();
        if !grid.fits_u32() || grid.pixel_count() > self.max_canvas_pixels {
            let (width, height) = grid.pixel_dimensions();
            return Err(TilingError::CanvasTooLarge {
                width,
                height,
                limit: self.max_canvas_pixels,
            });
        }
        Ok(())
    }
}

/// Layer names become a path component, so they must be a single plain segment
fn validate_layer_name(layer_name: &str) -> Result<()> {
    if layer_name.is_empty()
        || layer_name == "."
        || layer_name == ".."
        || layer_name.contains(['/', '\\'])
    {
        return Err(TilingError::Config(format!(
            "invalid layer name '{}'",
            layer_name
        )));
    }
    Ok(())
}
