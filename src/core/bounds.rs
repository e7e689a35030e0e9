use crate::core::geo::TileGrid;
use crate::{Result, TilingError};
use serde::{Deserialize, Serialize};

/// Extent of a flatmap in flat-map units (fmu).
///
/// The map origin is the bottom edge: map Y increases upward, while canvas
/// rows increase downward. At full zoom one fmu is one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapBounds {
    pub width: u32,
    pub height: u32,
}

impl MapBounds {
    /// Creates bounds, rejecting empty extents
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TilingError::Config(format!(
                "map bounds must be positive, got {}x{}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    /// Creates bounds from fractional fmu sizes, rounding partial units up
    pub fn from_fmu(width: f64, height: f64) -> Result<Self> {
        let to_units = |value: f64, axis: &str| -> Result<u32> {
            if !value.is_finite() || value <= 0.0 {
                return Err(TilingError::Config(format!(
                    "map {} must be a positive number of fmu, got {}",
                    axis, value
                )));
            }
            let units = value.ceil();
            if units > u32::MAX as f64 {
                return Err(TilingError::Config(format!(
                    "map {} of {} fmu is out of range",
                    axis, value
                )));
            }
            Ok(units as u32)
        };
        Self::new(to_units(width, "width")?, to_units(height, "height")?)
    }

    /// Tile grid covering these bounds at full zoom
    pub fn tile_grid(&self, tile_size: u32) -> TileGrid {
        TileGrid::for_bounds(self, tile_size)
    }

    /// Rows of transparent padding above the map on the full-zoom canvas
    pub fn top_padding(&self, tile_size: u32) -> u32 {
        self.tile_grid(tile_size).pixel_height() - self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_creation() {
        let bounds = MapBounds::new(10000, 18000).unwrap();
        assert_eq!(bounds.width, 10000);
        assert_eq!(bounds.height, 18000);
        assert_eq!(bounds.area(), 180_000_000);
    }

    #[test]
    fn test_zero_bounds_rejected() {
        assert!(matches!(
            MapBounds::new(0, 100),
            Err(TilingError::Config(_))
        ));
        assert!(matches!(
            MapBounds::new(100, 0),
            Err(TilingError::Config(_))
        ));
    }

    #[test]
    fn test_fractional_bounds() {
        let bounds = MapBounds::from_fmu(300.2, 99.5).unwrap();
        assert_eq!(bounds, MapBounds { width: 301, height: 100 });

        assert!(MapBounds::from_fmu(-1.0, 10.0).is_err());
        assert!(MapBounds::from_fmu(10.0, f64::NAN).is_err());
        assert!(MapBounds::from_fmu(0.0, 10.0).is_err());
    }

    #[test]
    fn test_top_padding() {
        let bounds = MapBounds::new(300, 100).unwrap();
        assert_eq!(bounds.top_padding(256), 156);

        let exact = MapBounds::new(512, 512).unwrap();
        assert_eq!(exact.top_padding(256), 0);
    }
}
