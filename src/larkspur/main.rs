//! Pipeline builder CLI: road-network JSON in, addressable artifacts out.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use gridcode::clustering::CommandClusterer;
use gridcode::formats::load_road_network;
use gridcode::geometry::GeoBounds;
use gridcode::pipeline;

#[derive(Parser, Debug)]
#[command(author, version, about = "Build the addressable road network from a segmenter extraction", long_about = None)]
struct Args {
    /// Road-network JSON produced by the road segmenter
    #[arg(long)]
    json: PathBuf,

    /// Directory all artifacts are written to
    #[arg(long)]
    out_dir: PathBuf,

    /// Geographic bounding box of the raster
    #[arg(long)]
    minlat: f64,
    #[arg(long)]
    minlon: f64,
    #[arg(long)]
    maxlat: f64,
    #[arg(long)]
    maxlon: f64,

    /// City center in pixel space; defaults to the raster midpoint
    #[arg(long)]
    center_row: Option<f64>,
    #[arg(long)]
    center_col: Option<f64>,

    /// External clustering command; receives the affinity matrix as JSON on
    /// stdin and must print one label per node as a JSON array
    #[arg(long)]
    cluster_cmd: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let network = load_road_network(&args.json)
        .with_context(|| format!("loading {}", args.json.display()))?;
    info!("loaded {} roads", network.roads.len());

    let clusterer = CommandClusterer::new(&args.cluster_cmd)?;
    let bounds = GeoBounds {
        min_lat: args.minlat,
        min_lon: args.minlon,
        max_lat: args.maxlat,
        max_lon: args.maxlon,
    };
    let center = match (args.center_row, args.center_col) {
        (Some(row), Some(col)) => Some((row, col)),
        _ => None,
    };

    let named = pipeline::build_artifacts(&network, &clusterer, bounds, center, &args.out_dir)?;
    info!(
        "pipeline finished: {} named roads written to {}",
        named.roads.len(),
        args.out_dir.display()
    );
    Ok(())
}
