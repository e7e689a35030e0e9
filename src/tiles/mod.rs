pub mod pyramid;
pub mod sink;

// Re-exports for convenience
pub use pyramid::{TileMaker, TilingReport};
pub use sink::{FileTileSink, MemoryTileSink, TileSink};
