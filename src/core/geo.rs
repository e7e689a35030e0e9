use crate::core::bounds::MapBounds;
use crate::core::constants::TILE_EXTENSION;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Grid of whole tiles covering a canvas at one zoom level.
///
/// The canvas is always padded up to a whole number of tiles, so
/// `pixel_width() >= map width` with less than one tile of slack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileGrid {
    pub columns: u32,
    pub rows: u32,
    pub tile_size: u32,
}

impl TileGrid {
    pub fn new(columns: u32, rows: u32, tile_size: u32) -> Self {
        Self {
            columns,
            rows,
            tile_size,
        }
    }

    /// Full-zoom grid for a map
    pub fn for_bounds(bounds: &MapBounds, tile_size: u32) -> Self {
        Self::new(
            bounds.width.div_ceil(tile_size),
            bounds.height.div_ceil(tile_size),
            tile_size,
        )
    }

    /// Padded canvas size in pixels, wide enough to never overflow
    pub fn pixel_dimensions(&self) -> (u64, u64) {
        (
            self.columns as u64 * self.tile_size as u64,
            self.rows as u64 * self.tile_size as u64,
        )
    }

    /// Whether the padded canvas can be addressed with `u32` pixel coordinates
    pub fn fits_u32(&self) -> bool {
        let (width, height) = self.pixel_dimensions();
        width <= u32::MAX as u64 && height <= u32::MAX as u64
    }

    /// Width of the padded canvas in pixels. Only meaningful for grids that
    /// pass [`TileGrid::fits_u32`], which `TilingConfig::validate` enforces.
    pub fn pixel_width(&self) -> u32 {
        self.columns.saturating_mul(self.tile_size)
    }

    /// Height of the padded canvas in pixels, see [`TileGrid::pixel_width`]
    pub fn pixel_height(&self) -> u32 {
        self.rows.saturating_mul(self.tile_size)
    }

    pub fn pixel_count(&self) -> u64 {
        let (width, height) = self.pixel_dimensions();
        width.saturating_mul(height)
    }

    pub fn tile_count(&self) -> u64 {
        self.columns as u64 * self.rows as u64
    }

    /// Deepest zoom level: the smallest `z` with `2^z >= max(columns, rows)`.
    pub fn full_zoom(&self) -> u8 {
        let max_tiles = self.columns.max(self.rows).max(1);
        max_tiles.next_power_of_two().trailing_zeros() as u8
    }

    /// Grid of the next coarser level. Tile counts round up, so an odd
    /// column or row leaves half a tile of transparent margin.
    pub fn overview(&self) -> Self {
        Self::new(
            self.columns.div_ceil(2),
            self.rows.div_ceil(2),
            self.tile_size,
        )
    }

    /// Tile coordinates of this grid in column-major order, rows from the bottom
    pub fn coords(&self, zoom: u8) -> impl Iterator<Item = TileCoord> + '_ {
        (0..self.columns).flat_map(move |x| (0..self.rows).map(move |y| TileCoord::new(x, y, zoom)))
    }

    /// Pixel origin (left, top) of a tile on this grid's canvas.
    /// Row 0 is the bottom-most tile row.
    pub fn tile_origin(&self, coord: &TileCoord) -> (u32, u32) {
        let left = coord.x * self.tile_size;
        let lower = self.pixel_height() - coord.y * self.tile_size;
        (left, lower - self.tile_size)
    }
}

/// Address of a tile within one layer's pyramid.
///
/// `x` is the column counted from the left, `y` the row counted from the
/// bottom edge of the canvas and `z` the zoom level (0 is coarsest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Gets the parent tile at a lower zoom level
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z == 0 {
            None
        } else {
            Some(TileCoord::new(self.x / 2, self.y / 2, self.z - 1))
        }
    }

    /// Path of the tile relative to a map's tile directory:
    /// `{layer}/{z}/{x}/{y}.png`
    pub fn relative_path(&self, layer_name: &str) -> PathBuf {
        let mut path = PathBuf::from(layer_name);
        path.push(self.z.to_string());
        path.push(self.x.to_string());
        path.push(format!("{}.{}", self.y, TILE_EXTENSION));
        path
    }
}
