//! Map manifest: the JSON description of a flatmap and its image layers
//!
//! ```json
//! {
//!   "id": "body",
//!   "size": [10000, 18000],
//!   "zoom_range": [2, 7],
//!   "layers": [
//!     { "id": "head", "source": "head.png", "transparent_color": [255, 255, 255] }
//!   ]
//! }
//! ```

use crate::core::bounds::MapBounds;
use crate::core::config::{TilingConfig, ZoomRange};
use crate::{Result, TilingError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapManifest {
    pub id: String,
    /// Map width and height in fmu
    pub size: [f64; 2],
    #[serde(default)]
    pub zoom_range: Option<[u8; 2]>,
    pub layers: Vec<LayerManifest>,
    /// Directory relative `source` paths are resolved against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerManifest {
    pub id: String,
    pub source: PathBuf,
    #[serde(default)]
    pub scale: Option<[f64; 2]>,
    #[serde(default)]
    pub offset: Option<[f64; 2]>,
    #[serde(default)]
    pub transparent_color: Option<[u8; 3]>,
    #[serde(default)]
    pub color_tolerance: u8,
}

impl MapManifest {
    pub fn parse(json: &str) -> Result<Self> {
        let manifest: MapManifest = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reads a manifest; relative layer sources resolve next to the file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let mut manifest = Self::parse(&json)?;
        manifest.base_dir = path.parent().map(Path::to_path_buf);
        Ok(manifest)
    }

    pub fn map_bounds(&self) -> Result<MapBounds> {
        MapBounds::from_fmu(self.size[0], self.size[1])
    }

    pub fn zoom_range(&self) -> Result<Option<ZoomRange>> {
        self.zoom_range
            .map(|[min, max]| ZoomRange::new(min, max))
            .transpose()
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(TilingError::Config("manifest has no map id".into()));
        }
        self.map_bounds()?;
        self.zoom_range()?;
        if self.layers.is_empty() {
            return Err(TilingError::Config(format!(
                "map '{}' has no layers",
                self.id
            )));
        }
        for (index, layer) in self.layers.iter().enumerate() {
            if self.layers[..index].iter().any(|other| other.id == layer.id) {
                return Err(TilingError::Config(format!(
                    "duplicate layer id '{}'",
                    layer.id
                )));
            }
            self.layer_config(layer)?.validate()?;
        }
        Ok(())
    }

    /// Tiling configuration for one of this map's layers
    pub fn layer_config(&self, layer: &LayerManifest) -> Result<TilingConfig> {
        let mut config = TilingConfig::new(self.id.clone(), self.map_bounds()?, layer.id.clone());
        config.zoom_range = self.zoom_range()?;
        config.scale = layer.scale.map(|[x, y]| (x, y));
        config.offset = layer.offset.map(|[x, y]| (x, y));
        Ok(config)
    }

    /// Location of a layer's source image
    pub fn source_path(&self, layer: &LayerManifest) -> PathBuf {
        match &self.base_dir {
            Some(base) if layer.source.is_relative() => base.join(&layer.source),
            _ => layer.source.clone(),
        }
    }

    pub fn layer(&self, id: &str) -> Option<&LayerManifest> {
        self.layers.iter().find(|layer| layer.id == id)
    }
}
