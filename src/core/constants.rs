//! Core constants for flatmap tiling.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Default square tile size in pixels (1 pixel == 1 fmu at full zoom).
pub const TILE_SIZE: u32 = 256;

/// Upper bound on the pixel count of any canvas or resampled image.
/// 2^30 RGBA pixels is 4 GiB of buffer.
pub const DEFAULT_MAX_CANVAS_PIXELS: u64 = 1 << 30;

/// Directory inserted between the map id and the layer name on disk.
pub const TILES_DIRECTORY: &str = "tiles";

/// Extension of every persisted tile.
pub const TILE_EXTENSION: &str = "png";
