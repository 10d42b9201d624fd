//! On-disk JSON contracts with the external road segmenter and the
//! name-to-road artifact consumed by the reverse geocoder.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type RoadId = u32;

/// Integer pixel location. Row 0 is the top of the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PixelPoint {
    pub row: i64,
    pub col: i64,
}

impl PixelPoint {
    pub fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    /// Euclidean distance in pixel units.
    pub fn dist(&self, other: &PixelPoint) -> f64 {
        let dr = (self.row - other.row) as f64;
        let dc = (self.col - other.col) as f64;
        (dr * dr + dc * dc).sqrt()
    }
}

/// One point of a road polyline: pixel location plus the cumulative distance
/// tag the segmenter attached to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadPoint {
    pub pixel: PixelPoint,
    pub dist: f64,
}

impl RoadPoint {
    pub fn new(row: i64, col: i64, dist: f64) -> Self {
        Self {
            pixel: PixelPoint::new(row, col),
            dist,
        }
    }
}

/// Raster dimensions carried alongside every pixel-space artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub height: u32,
    pub width: u32,
}

/// Parsed road-network extraction: the segmenter's `roads.json`.
#[derive(Debug)]
pub struct RoadNetwork {
    /// Road id -> ordered pixel polyline.
    pub roads: BTreeMap<RoadId, Vec<RoadPoint>>,
    /// Every road pixel -> the road it belongs to.
    pub pixel_to_road: AHashMap<PixelPoint, RoadId>,
    pub meta: ImageMeta,
}

/// Named road polylines plus the raster dimensions they are expressed in.
/// The long-lived artifact the reverse geocoder walks.
#[derive(Debug, PartialEq)]
pub struct NamedRoads {
    pub meta: ImageMeta,
    pub roads: BTreeMap<String, Vec<RoadPoint>>,
}

// Road ids appear as JSON numbers or strings depending on the segmenter
// build; accept both.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdValue {
    Num(RoadId),
    Text(String),
}

impl IdValue {
    fn parse(self, context: &str) -> Result<RoadId> {
        match self {
            IdValue::Num(id) => Ok(id),
            IdValue::Text(s) => s
                .parse()
                .map_err(|_| Error::MalformedInput(format!("bad road id '{s}' in {context}"))),
        }
    }
}

#[derive(Deserialize)]
struct RawRoadNetwork {
    id_road: BTreeMap<String, Vec<(i64, i64, f64)>>,
    pixel_road: AHashMap<String, IdValue>,
    img_meta: ImageMeta,
}

/// Parse a `"(row, col)"` string key into a [`PixelPoint`].
fn parse_pixel_key(key: &str) -> Result<PixelPoint> {
    let bad = || Error::MalformedInput(format!("bad pixel key '{key}'"));
    let inner = key
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(bad)?;
    let (row, col) = inner.split_once(',').ok_or_else(bad)?;
    Ok(PixelPoint::new(
        row.trim().parse().map_err(|_| bad())?,
        col.trim().parse().map_err(|_| bad())?,
    ))
}

fn road_points(raw: Vec<(i64, i64, f64)>) -> Vec<RoadPoint> {
    raw.into_iter()
        .map(|(row, col, dist)| RoadPoint::new(row, col, dist))
        .collect()
}

/// Load the segmenter's road-network JSON.
pub fn load_road_network(path: &Path) -> Result<RoadNetwork> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let raw: RawRoadNetwork = serde_json::from_str(&text).map_err(|e| Error::json(path, e))?;

    let mut roads = BTreeMap::new();
    for (id, points) in raw.id_road {
        let id = id
            .parse::<RoadId>()
            .map_err(|_| Error::MalformedInput(format!("bad road id '{id}' in id_road")))?;
        roads.insert(id, road_points(points));
    }

    let mut pixel_to_road = AHashMap::with_capacity(raw.pixel_road.len());
    for (key, id) in raw.pixel_road {
        let pixel = parse_pixel_key(&key)?;
        pixel_to_road.insert(pixel, id.parse("pixel_road")?);
    }

    Ok(RoadNetwork {
        roads,
        pixel_to_road,
        meta: raw.img_meta,
    })
}

// The name-to-road document is a two-element array: image metadata, then the
// name -> polyline map.
type RawNamedRoads = (ImageMeta, BTreeMap<String, Vec<(i64, i64, f64)>>);

pub fn load_name_to_road(path: &Path) -> Result<NamedRoads> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let (meta, raw): RawNamedRoads = serde_json::from_str(&text).map_err(|e| Error::json(path, e))?;
    let roads = raw
        .into_iter()
        .map(|(name, points)| (name, road_points(points)))
        .collect();
    Ok(NamedRoads { meta, roads })
}

pub fn write_name_to_road(path: &Path, named: &NamedRoads) -> Result<()> {
    let raw: RawNamedRoads = (
        named.meta,
        named
            .roads
            .iter()
            .map(|(name, points)| {
                (
                    name.clone(),
                    points
                        .iter()
                        .map(|p| (p.pixel.row, p.pixel.col, p.dist))
                        .collect(),
                )
            })
            .collect(),
    );
    let text = serde_json::to_string(&raw).map_err(|e| Error::json(path, e))?;
    fs::write(path, text).map_err(|e| Error::io(path, e))
}
