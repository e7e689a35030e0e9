//! Tile pyramid generation
//!
//! Starting from the full-zoom canvas, each level is cut into tiles, visible
//! tiles are handed to the sink, and every visible tile is halved into the
//! next level's overview canvas. Levels are processed finest to coarsest and
//! zoom 0 is always built.
//!
//! Halving happens whether or not a tile was persisted, so coarse levels keep
//! content from fine levels that lie outside the requested zoom range.

use crate::core::config::{TilingConfig, WriteFailurePolicy};
use crate::core::geo::{TileCoord, TileGrid};
use crate::layers::canvas::{compose_canvas, has_visible_pixels, resample};
use crate::layers::image::ImageSource;
use crate::tiles::sink::TileSink;
use crate::{Result, TilingError};
use image::imageops;
use image::{GenericImageView, Rgba, RgbaImage};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-level tile counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelReport {
    pub zoom: u8,
    pub grid: TileGrid,
    /// Visible tiles handed to the sink
    pub emitted: usize,
    /// Visible tiles outside the persisted zoom range
    pub withheld: usize,
    /// Fully transparent tiles
    pub empty: usize,
    /// Visible tiles the sink failed to store (skip policy only)
    pub failed: usize,
}

impl LevelReport {
    fn new(zoom: u8, grid: TileGrid) -> Self {
        Self {
            zoom,
            grid,
            emitted: 0,
            withheld: 0,
            empty: 0,
            failed: 0,
        }
    }

    pub fn visible(&self) -> usize {
        self.emitted + self.withheld + self.failed
    }
}

/// Summary of a whole tiling run, levels ordered finest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TilingReport {
    pub layer_name: String,
    pub full_zoom: u8,
    pub levels: Vec<LevelReport>,
}

impl TilingReport {
    pub fn level(&self, zoom: u8) -> Option<&LevelReport> {
        self.levels.iter().find(|level| level.zoom == zoom)
    }

    pub fn tiles_emitted(&self) -> usize {
        self.levels.iter().map(|level| level.emitted).sum()
    }

    pub fn tiles_failed(&self) -> usize {
        self.levels.iter().map(|level| level.failed).sum()
    }
}

/// What happened to one tile of a level
enum TileOutcome {
    Empty,
    Visible { half: RgbaImage, status: WriteStatus },
}

enum WriteStatus {
    Written,
    Withheld,
    Failed,
}

/// Result of tiling one level: its report and the next coarser canvas
struct LevelOutput {
    report: LevelReport,
    overview: RgbaImage,
    overview_grid: TileGrid,
}

/// Generates the tile pyramid of one image layer
#[derive(Debug, Clone)]
pub struct TileMaker {
    config: TilingConfig,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl TileMaker {
    /// Create a tile maker, rejecting invalid configuration up front
    pub fn new(config: TilingConfig) -> Result<Self> {
        config.validate()?;
        if let Some(range) = config.zoom_range {
            if range.min > config.full_zoom() {
                log::warn!(
                    "zoom range {}..={} lies above full zoom {}; no tiles of layer '{}' will be written",
                    range.min,
                    range.max,
                    config.full_zoom(),
                    config.layer_name
                );
            }
        }
        Ok(Self {
            config,
            cancel_flag: None,
        })
    }

    /// Stop between zoom levels once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    pub fn config(&self) -> &TilingConfig {
        &self.config
    }

    pub fn full_zoom(&self) -> u8 {
        self.config.full_zoom()
    }

    /// Place `source` on the map canvas and tile every zoom level
    pub fn make_tiles(&self, source: &ImageSource, sink: &dyn TileSink) -> Result<TilingReport> {
        if source.layer_name() != self.config.layer_name {
            return Err(TilingError::Config(format!(
                "image for layer '{}' given to tile maker of layer '{}'",
                source.layer_name(),
                self.config.layer_name
            )));
        }
        let canvas = compose_canvas(source, &self.config)?;
        self.tile_canvas(canvas, sink)
    }

    /// Tile an already composed full-zoom canvas
    pub fn tile_canvas(&self, canvas: RgbaImage, sink: &dyn TileSink) -> Result<TilingReport> {
        let mut grid = self.config.tile_grid();
        if canvas.dimensions() != (grid.pixel_width(), grid.pixel_height()) {
            return Err(TilingError::Config(format!(
                "canvas is {}x{} but the map needs {}x{}",
                canvas.width(),
                canvas.height(),
                grid.pixel_width(),
                grid.pixel_height()
            )));
        }

        let full_zoom = grid.full_zoom();
        let mut report = TilingReport {
            layer_name: self.config.layer_name.clone(),
            full_zoom,
            levels: Vec::with_capacity(full_zoom as usize + 1),
        };

        let mut canvas = canvas;
        let mut zoom = full_zoom;
        loop {
            if self.is_cancelled() {
                return Err(TilingError::Cancelled { zoom });
            }
            log::info!(
                "Tiling '{}' level {} ({}x{} tiles, {}x{} canvas)",
                self.config.layer_name,
                zoom,
                grid.columns,
                grid.rows,
                canvas.width(),
                canvas.height()
            );

            let output = self.tile_level(&canvas, grid, zoom, sink)?;
            report.levels.push(output.report);
            if zoom == 0 {
                break;
            }
            canvas = output.overview;
            grid = output.overview_grid;
            zoom -= 1;
        }

        log::info!(
            "Layer '{}': {} tiles written over {} levels",
            self.config.layer_name,
            report.tiles_emitted(),
            report.levels.len()
        );
        Ok(report)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst))
    }

    /// One level transition: (canvas, grid) in, report and overview out
    fn tile_level(
        &self,
        canvas: &RgbaImage,
        grid: TileGrid,
        zoom: u8,
        sink: &dyn TileSink,
    ) -> Result<LevelOutput> {
        let coords: Vec<TileCoord> = grid.coords(zoom).collect();
        let outcomes = self.process_tiles(canvas, &grid, &coords, sink)?;

        let overview_grid = grid.overview();
        let mut overview = RgbaImage::new(overview_grid.pixel_width(), overview_grid.pixel_height());
        // Odd row counts leave half a tile of padding at the top
        let pad_top = overview.height() - canvas.height() / 2;

        let mut report = LevelReport::new(zoom, grid);
        for (coord, outcome) in coords.iter().zip(outcomes) {
            match outcome {
                TileOutcome::Empty => report.empty += 1,
                TileOutcome::Visible { half, status } => {
                    match status {
                        WriteStatus::Written => report.emitted += 1,
                        WriteStatus::Withheld => report.withheld += 1,
                        WriteStatus::Failed => report.failed += 1,
                    }
                    let (left, top) = grid.tile_origin(coord);
                    imageops::overlay(
                        &mut overview,
                        &half,
                        (left / 2) as i64,
                        (pad_top + top / 2) as i64,
                    );
                }
            }
        }

        log::debug!(
            "level {}: {} emitted, {} withheld, {} empty, {} failed",
            zoom,
            report.emitted,
            report.withheld,
            report.empty,
            report.failed
        );
        Ok(LevelOutput {
            report,
            overview,
            overview_grid,
        })
    }

    #[cfg(feature = "parallel")]
    fn process_tiles(
        &self,
        canvas: &RgbaImage,
        grid: &TileGrid,
        coords: &[TileCoord],
        sink: &dyn TileSink,
    ) -> Result<Vec<TileOutcome>> {
        use rayon::prelude::*;

        if self.config.parallel {
            return coords
                .par_iter()
                .map(|coord| self.process_tile(canvas, grid, *coord, sink))
                .collect();
        }
        coords
            .iter()
            .map(|coord| self.process_tile(canvas, grid, *coord, sink))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn process_tiles(
        &self,
        canvas: &RgbaImage,
        grid: &TileGrid,
        coords: &[TileCoord],
        sink: &dyn TileSink,
    ) -> Result<Vec<TileOutcome>> {
        coords
            .iter()
            .map(|coord| self.process_tile(canvas, grid, *coord, sink))
            .collect()
    }

    /// Crop, test, emit and halve a single tile
    fn process_tile(
        &self,
        canvas: &RgbaImage,
        grid: &TileGrid,
        coord: TileCoord,
        sink: &dyn TileSink,
    ) -> Result<TileOutcome> {
        let size = grid.tile_size;
        let (left, top) = grid.tile_origin(&coord);
        let view = imageops::crop_imm(canvas, left, top, size, size);
        if !view.pixels().any(|(_, _, pixel)| pixel.0[3] != 0) {
            return Ok(TileOutcome::Empty);
        }
        let tile = view.to_image();

        let status = if self.config.persists_zoom(coord.z) {
            self.emit(sink, coord, &tile)?
        } else {
            WriteStatus::Withheld
        };

        let half = downsample_tile(&tile, size / 2);
        Ok(TileOutcome::Visible { half, status })
    }

    fn emit(&self, sink: &dyn TileSink, coord: TileCoord, tile: &RgbaImage) -> Result<WriteStatus> {
        let layer_name = &self.config.layer_name;
        match sink.emit(layer_name, coord, tile) {
            Ok(()) => {
                log::debug!("emitted {} {:?}", layer_name, coord);
                Ok(WriteStatus::Written)
            }
            Err(err) => match self.config.write_failure_policy {
                WriteFailurePolicy::Abort => Err(TilingError::TileWrite {
                    layer: layer_name.clone(),
                    coord,
                    source: Box::new(err),
                }),
                WriteFailurePolicy::SkipAndLog => {
                    log::warn!("skipping tile {:?} of layer '{}': {}", coord, layer_name, err);
                    Ok(WriteStatus::Failed)
                }
            },
        }
    }
}

/// Halve a tile with the premultiplied resampling filter.
///
/// Lanczos can round faint, sparse content down to zero alpha; when that
/// happens the tile is reduced by keeping the most opaque pixel of each 2x2
/// block instead, so visible content always reaches the coarser level.
pub fn downsample_tile(tile: &RgbaImage, half_size: u32) -> RgbaImage {
    let half = resample(tile, half_size, half_size);
    if has_visible_pixels(&half) || !has_visible_pixels(tile) {
        return half;
    }
    max_alpha_reduce(tile, half_size)
}

fn max_alpha_reduce(tile: &RgbaImage, half_size: u32) -> RgbaImage {
    RgbaImage::from_fn(half_size, half_size, |x, y| {
        let mut best = Rgba([0, 0, 0, 0]);
        for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            let (sx, sy) = (2 * x + dx, 2 * y + dy);
            if sx < tile.width() && sy < tile.height() {
                let pixel = *tile.get_pixel(sx, sy);
                if pixel.0[3] > best.0[3] {
                    best = pixel;
                }
            }
        }
        best
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bounds::MapBounds;
    use crate::core::config::ZoomRange;
    use crate::tiles::sink::MemoryTileSink;

    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn maker(width: u32, height: u32) -> TileMaker {
        let bounds = MapBounds::new(width, height).unwrap();
        TileMaker::new(TilingConfig::new("map", bounds, "layer")).unwrap()
    }

    #[test]
    fn test_single_tile_map() {
        let maker = maker(200, 100);
        let sink = MemoryTileSink::new();
        let source = ImageSource::new("layer", RgbaImage::from_pixel(200, 100, BLUE));

        let report = maker.make_tiles(&source, &sink).unwrap();
        assert_eq!(report.full_zoom, 0);
        assert_eq!(report.levels.len(), 1);
        assert_eq!(sink.coords("layer"), vec![TileCoord::new(0, 0, 0)]);

        let tile = sink.get("layer", TileCoord::new(0, 0, 0)).unwrap();
        assert_eq!(tile.dimensions(), (256, 256));
        assert_eq!(*tile.get_pixel(0, 156), BLUE);
        assert_eq!(tile.get_pixel(0, 155).0[3], 0);
        assert_eq!(tile.get_pixel(200, 255).0[3], 0);
    }

    #[test]
    fn test_empty_canvas_emits_nothing() {
        let maker = maker(1000, 1000);
        let sink = MemoryTileSink::new();
        let report = maker.tile_canvas(RgbaImage::new(1024, 1024), &sink).unwrap();

        assert!(sink.is_empty());
        assert_eq!(report.levels.len(), 3);
        assert_eq!(report.level(2).unwrap().empty, 16);
        assert_eq!(report.level(0).unwrap().empty, 1);
    }

    #[test]
    fn test_canvas_size_must_match_grid() {
        let maker = maker(512, 512);
        let result = maker.tile_canvas(RgbaImage::new(512, 256), &MemoryTileSink::new());
        assert!(matches!(result, Err(TilingError::Config(_))));
    }

    #[test]
    fn test_layer_name_must_match() {
        let maker = maker(512, 512);
        let source = ImageSource::new("other", RgbaImage::new(4, 4));
        let result = maker.make_tiles(&source, &MemoryTileSink::new());
        assert!(matches!(result, Err(TilingError::Config(_))));
    }

    #[test]
    fn test_odd_row_count_pads_overview_top() {
        // 3 rows at zoom 2 become 2 rows at zoom 1 with half a tile of padding on top
        let maker = maker(256, 768);
        let mut canvas = RgbaImage::new(256, 768);
        for x in 0..256 {
            for y in 0..256 {
                canvas.put_pixel(x, y, BLUE);
            }
        }
        let sink = MemoryTileSink::new();
        maker.tile_canvas(canvas, &sink).unwrap();

        assert_eq!(sink.coords_at_zoom("layer", 2), vec![TileCoord::new(0, 2, 2)]);
        // Top canvas tile lands in the upper half of the zoom 1 row 1 tile
        assert_eq!(sink.coords_at_zoom("layer", 1), vec![TileCoord::new(0, 1, 1)]);
        let tile = sink.get("layer", TileCoord::new(0, 1, 1)).unwrap();
        assert_eq!(tile.get_pixel(64, 100).0[3], 0);
        assert_eq!(tile.get_pixel(64, 200).0[3], 255);
        assert_eq!(tile.get_pixel(200, 200).0[3], 0);
    }

    #[test]
    fn test_withheld_tiles_still_propagate() {
        let bounds = MapBounds::new(512, 512).unwrap();
        let config = TilingConfig::new("map", bounds, "layer")
            .with_zoom_range(ZoomRange::new(0, 0).unwrap());
        let maker = TileMaker::new(config).unwrap();

        let mut canvas = RgbaImage::new(512, 512);
        canvas.put_pixel(400, 100, BLUE);
        let sink = MemoryTileSink::new();
        let report = maker.tile_canvas(canvas, &sink).unwrap();

        let fine = report.level(1).unwrap();
        assert_eq!((fine.emitted, fine.withheld, fine.empty), (0, 1, 3));
        assert_eq!(sink.coords("layer"), vec![TileCoord::new(0, 0, 0)]);
    }

    #[test]
    fn test_faint_pixel_survives_downsampling() {
        let mut tile = RgbaImage::new(256, 256);
        tile.put_pixel(31, 77, Rgba([10, 20, 30, 1]));

        let half = downsample_tile(&tile, 128);
        assert_eq!(half.dimensions(), (128, 128));
        assert_eq!(*half.get_pixel(15, 38), Rgba([10, 20, 30, 1]));
    }

    #[test]
    fn test_half_transparent_tile_keeps_edge_colour() {
        // Opaque white left half, transparent right half
        let tile = RgbaImage::from_fn(256, 256, |x, _| {
            if x < 128 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        let half = downsample_tile(&tile, 128);

        for x in [62, 63, 64, 65] {
            let pixel = half.get_pixel(x, 10);
            if pixel.0[3] > 0 {
                assert_eq!(pixel.0[..3], [255, 255, 255], "pixel {} is {:?}", x, pixel);
            }
        }
        let (inner, outer) = (half.get_pixel(63, 10).0[3], half.get_pixel(64, 10).0[3]);
        assert!(inner > 200 && inner < 255, "alpha {}", inner);
        assert!(outer > 0 && outer < 50, "alpha {}", outer);
        assert!(half
            .pixels()
            .filter(|pixel| pixel.0[3] > 0)
            .all(|pixel| pixel.0[..3] == [255, 255, 255]));
    }

    #[test]
    fn test_cancel_between_levels() {
        let flag = Arc::new(AtomicBool::new(true));
        let maker = maker(512, 512).with_cancel_flag(flag);
        let result = maker.tile_canvas(RgbaImage::new(512, 512), &MemoryTileSink::new());
        assert!(matches!(result, Err(TilingError::Cancelled { zoom: 1 })));
    }
}
