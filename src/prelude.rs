//! Prelude module for common flatmap-tiles types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use flatmap_tiles::prelude::*;`

pub use crate::core::{
    bounds::MapBounds,
    config::{TilingConfig, WriteFailurePolicy, ZoomRange},
    constants::TILE_SIZE,
    geo::{TileCoord, TileGrid},
    manifest::{LayerManifest, MapManifest},
};

pub use crate::layers::{
    canvas::compose_canvas,
    image::{make_color_transparent, ImageSource},
};

pub use crate::tiles::{
    pyramid::{LevelReport, TileMaker, TilingReport},
    sink::{FileTileSink, MemoryTileSink, TileSink},
};

pub use crate::{Error as TilingError, Result};

pub use std::sync::{atomic::AtomicBool, Arc};
