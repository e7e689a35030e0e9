//! tilemaker - builds the tile pyramids of every image layer of a flatmap
//!
//! Tiles are written to `OUTPUT_DIR/{map id}/tiles/{layer}/{z}/{x}/{y}.png`.

use anyhow::{bail, Context};
use clap::Parser;
use flatmap_tiles::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "tilemaker")]
#[command(about = "Generate slippy-map tiles for the image layers of a flatmap", long_about = None)]
struct Args {
    /// Map manifest (JSON) describing the map size and its image layers
    manifest: PathBuf,

    /// Directory the map's tile tree is written under
    output_dir: PathBuf,

    /// Only tile these layers (may be repeated)
    #[arg(long = "layer")]
    layers: Vec<String>,

    /// Lowest zoom level to write (overrides the manifest)
    #[arg(long, requires = "max_zoom")]
    min_zoom: Option<u8>,

    /// Highest zoom level to write (overrides the manifest)
    #[arg(long, requires = "min_zoom")]
    max_zoom: Option<u8>,

    /// Log tiles that fail to write and keep going instead of aborting
    #[arg(long)]
    skip_failed_tiles: bool,

    /// Tile on the current thread only
    #[arg(long)]
    serial: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let manifest = MapManifest::from_file(&args.manifest)
        .with_context(|| format!("reading manifest {}", args.manifest.display()))?;
    if !args.output_dir.is_dir() {
        bail!("output directory '{}' does not exist", args.output_dir.display());
    }

    for name in &args.layers {
        if manifest.layer(name).is_none() {
            bail!("map '{}' has no layer '{}'", manifest.id, name);
        }
    }

    let zoom_override = match (args.min_zoom, args.max_zoom) {
        (Some(min), Some(max)) => Some(ZoomRange::new(min, max)?),
        _ => None,
    };
    let policy = if args.skip_failed_tiles {
        WriteFailurePolicy::SkipAndLog
    } else {
        WriteFailurePolicy::Abort
    };

    let mut tiles_dir = None;
    for layer in &manifest.layers {
        if !args.layers.is_empty() && !args.layers.contains(&layer.id) {
            continue;
        }

        let mut config = manifest
            .layer_config(layer)?
            .with_write_failure_policy(policy)
            .with_parallel(!args.serial);
        if zoom_override.is_some() {
            config.zoom_range = zoom_override;
        }

        let source_path = manifest.source_path(layer);
        let mut source = ImageSource::from_file(&source_path, &layer.id)
            .with_context(|| format!("loading image {}", source_path.display()))?;
        if let Some(color) = layer.transparent_color {
            source = source.with_transparent_color(color, layer.color_tolerance);
        }

        let sink = FileTileSink::for_config(&args.output_dir, &config);
        let started = Instant::now();
        let report = TileMaker::new(config)?
            .make_tiles(&source, &sink)
            .with_context(|| format!("tiling layer '{}'", layer.id))?;

        log::info!(
            "Layer '{}' done in {:.1}s: {} tiles written, {} failed, zoom 0..={}",
            layer.id,
            started.elapsed().as_secs_f64(),
            report.tiles_emitted(),
            report.tiles_failed(),
            report.full_zoom
        );
        tiles_dir.get_or_insert_with(|| sink.tiles_dir());
    }

    if let Some(dir) = tiles_dir {
        log::info!("Tiles written to {}", dir.display());
    }
    Ok(())
}
