//! Forward/reverse geocoder CLI over a built address dataset.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use gridcode::formats::load_name_to_road;
use gridcode::geocode;
use gridcode::geometry::PixelMapper;
use gridcode::osm::{ROADS_OSM_FILE, read_roads_osm};
use gridcode::pipeline::NAME_TO_ROAD_FILE;
use gridcode::spatial::RoadSpatialIndex;

#[derive(Parser, Debug)]
#[command(author, version, about = "Resolve coordinates to road addresses and back", long_about = None)]
struct Args {
    /// Directory containing roads.osm, name_to_road.json and the rtree pair
    #[arg(long)]
    path: PathBuf,

    /// Latitude of the point to address (forward mode)
    #[arg(long)]
    lat: Option<f64>,

    /// Longitude of the point to address (forward mode)
    #[arg(long)]
    lon: Option<f64>,

    /// City name appended to the resolved address (forward mode)
    #[arg(long)]
    city: Option<String>,

    /// Distance field of the address to resolve (reverse mode)
    #[arg(long)]
    meter: Option<i64>,

    /// Block letter of the address to resolve (reverse mode)
    #[arg(long)]
    block: Option<char>,

    /// Street name of the address to resolve (reverse mode)
    #[arg(long)]
    street: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match (args.lat, args.lon, args.meter, args.block, args.street) {
        (Some(lat), Some(lon), None, None, None) => {
            let index = RoadSpatialIndex::load(&args.path)
                .with_context(|| format!("loading spatial index from {}", args.path.display()))?;
            let city = args.city.as_deref().unwrap_or("");
            let address = geocode::forward(&index, lat, lon, city)?;
            println!("Address: {address}");
        }
        (None, None, Some(meter), Some(block), Some(street)) => {
            let named = load_name_to_road(&args.path.join(NAME_TO_ROAD_FILE))?;
            let document = read_roads_osm(&args.path.join(ROADS_OSM_FILE))?;
            let mapper = PixelMapper::new(document.bounds, named.meta);
            let [lat, lon] = geocode::reverse(&named, &mapper, meter, block, &street)?;
            println!("Lat, Lon: {lat}, {lon}");
        }
        _ => bail!("provide either --lat/--lon/--city or --meter/--block/--street"),
    }

    Ok(())
}
