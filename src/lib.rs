//! # flatmap-tiles
//!
//! Builds slippy-map tile pyramids from large raster images placed on a
//! flatmap.
//!
//! A source image is scaled and positioned on the full-resolution map canvas,
//! the canvas is cut into fixed-size tiles, and each coarser zoom level is
//! built by halving the previous one until a single tile covers the whole map.
//! Only tiles with visible content are handed to a [`TileSink`].

pub mod core;
pub mod layers;
pub mod prelude;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    bounds::MapBounds,
    config::{TilingConfig, WriteFailurePolicy, ZoomRange},
    geo::{TileCoord, TileGrid},
    manifest::{LayerManifest, MapManifest},
};

pub use layers::{
    canvas::compose_canvas,
    image::{make_color_transparent, ImageSource},
};

pub use tiles::{
    pyramid::{LevelReport, TileMaker, TilingReport},
    sink::{FileTileSink, MemoryTileSink, TileSink},
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, TilingError>;

/// Tiling error types
#[derive(Debug, thiserror::Error)]
pub enum TilingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resample error: {0}")]
    Resample(String),

    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),

    #[error("Canvas of {width}x{height} pixels exceeds the limit of {limit} pixels")]
    CanvasTooLarge { width: u64, height: u64, limit: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Failed to write tile {coord:?} of layer '{layer}': {source}")]
    TileWrite {
        layer: String,
        coord: TileCoord,
        #[source]
        source: Box<TilingError>,
    },

    #[error("Tiling cancelled before zoom level {zoom}")]
    Cancelled { zoom: u8 },
}

/// Error type alias for convenience
pub type Error = TilingError;
