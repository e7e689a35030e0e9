use crate::core::config::TilingConfig;
use crate::core::constants::TILES_DIRECTORY;
use crate::core::geo::TileCoord;
use crate::Result;
use fxhash::FxHashMap;
use image::{ImageFormat, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Anything that can persist the tiles of a pyramid.
///
/// Tiles may arrive in any order and, when tiling in parallel, from several
/// threads at once.
pub trait TileSink: Send + Sync {
    /// Store one non-empty tile of `layer_name`
    fn emit(&self, layer_name: &str, coord: TileCoord, pixels: &RgbaImage) -> Result<()>;
}

/// Writes tiles as PNG files under `{root}/{map_id}/tiles/{layer}/{z}/{x}/{y}.png`,
/// creating directories on first use.
#[derive(Debug, Clone)]
pub struct FileTileSink {
    root: PathBuf,
    map_id: String,
}

impl FileTileSink {
    pub fn new(root: impl Into<PathBuf>, map_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            map_id: map_id.into(),
        }
    }

    /// Sink for the map a tiling config belongs to
    pub fn for_config(root: impl Into<PathBuf>, config: &TilingConfig) -> Self {
        Self::new(root, config.map_id.clone())
    }

    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    /// Directory holding every layer of the map
    pub fn tiles_dir(&self) -> PathBuf {
        self.root.join(&self.map_id).join(TILES_DIRECTORY)
    }

    /// Build the file path for the requested tile
    pub fn tile_path(&self, layer_name: &str, coord: TileCoord) -> PathBuf {
        self.tiles_dir().join(coord.relative_path(layer_name))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TileSink for FileTileSink {
    fn emit(&self, layer_name: &str, coord: TileCoord, pixels: &RgbaImage) -> Result<()> {
        let path = self.tile_path(layer_name, coord);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        pixels.save_with_format(&path, ImageFormat::Png)?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }
}

/// In-memory tile store keyed by layer and coordinate
#[derive(Debug, Default)]
pub struct MemoryTileSink {
    tiles: Mutex<FxHashMap<(String, TileCoord), RgbaImage>>,
}

impl MemoryTileSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of a stored tile
    pub fn get(&self, layer_name: &str, coord: TileCoord) -> Option<RgbaImage> {
        self.tiles
            .lock()
            .ok()?
            .get(&(layer_name.to_string(), coord))
            .cloned()
    }

    pub fn contains(&self, layer_name: &str, coord: TileCoord) -> bool {
        self.tiles
            .lock()
            .ok()
            .map(|tiles| tiles.contains_key(&(layer_name.to_string(), coord)))
            .unwrap_or(false)
    }

    /// Sorted coordinates of every stored tile of a layer
    pub fn coords(&self, layer_name: &str) -> Vec<TileCoord> {
        let mut coords: Vec<TileCoord> = self
            .tiles
            .lock()
            .map(|tiles| {
                tiles
                    .keys()
                    .filter(|(layer, _)| layer == layer_name)
                    .map(|(_, coord)| *coord)
                    .collect()
            })
            .unwrap_or_default();
        coords.sort();
        coords
    }

    /// Coordinates stored for one zoom level of a layer
    pub fn coords_at_zoom(&self, layer_name: &str, zoom: u8) -> Vec<TileCoord> {
        self.coords(layer_name)
            .into_iter()
            .filter(|coord| coord.z == zoom)
            .collect()
    }

    /// Get the current number of stored tiles
    pub fn len(&self) -> usize {
        self.tiles.lock().map(|tiles| tiles.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every stored tile
    pub fn clear(&self) {
        if let Ok(mut tiles) = self.tiles.lock() {
            tiles.clear();
        }
    }
}

impl TileSink for MemoryTileSink {
    fn emit(&self, layer_name: &str, coord: TileCoord, pixels: &RgbaImage) -> Result<()> {
        self.tiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((layer_name.to_string(), coord), pixels.clone());
        Ok(())
    }
}
