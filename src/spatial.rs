//! R-tree index over named road edges, persisted as an index/data file pair.

use std::fs;
use std::path::Path;

use itertools::Itertools;
use log::info;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{self, haversine};

pub const INDEX_FILE: &str = "rtree.idx";
pub const DATA_FILE: &str = "rtree.dat";

/// One edge of a named road: its endpoints, the great-circle distance along
/// the road up to the edge's start, and the road's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialEdge {
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub distance_along: f64,
    pub road: String,
}

type EdgeEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Read-only spatial index over road edges. Queries take `&self`, so a built
/// index can serve concurrent lookups; rebuilds produce a whole new value
/// (and file pair) rather than mutating in place.
pub struct RoadSpatialIndex {
    tree: RTree<EdgeEnvelope>,
    edges: Vec<SpatialEdge>,
}

impl RoadSpatialIndex {
    /// Bulk-build from named road geometries in `[lat, lon]` space.
    ///
    /// Degenerate (zero-length) edges are skipped and contribute nothing to
    /// the cumulative distance. `pad` widens every edge's bounding box.
    pub fn build(ways: &[(Vec<[f64; 2]>, String)], pad: f64) -> Self {
        let mut edges = Vec::new();
        let mut envelopes = Vec::new();

        for (coords, name) in ways {
            let mut along = 0.0;
            for (&a, &b) in coords.iter().tuple_windows() {
                if a == b {
                    continue;
                }
                let (lower, upper) = geometry::segment_bbox(a, b, pad);
                envelopes.push(GeomWithData::new(
                    Rectangle::from_corners(lower, upper),
                    edges.len(),
                ));
                edges.push(SpatialEdge {
                    start: a,
                    end: b,
                    distance_along: along,
                    road: name.clone(),
                });
                along += haversine(a, b);
            }
        }

        info!("spatial index built over {} edges", edges.len());
        Self {
            tree: RTree::bulk_load(envelopes),
            edges,
        }
    }

    /// Every edge whose bounding box intersects the standard query window
    /// around the coordinate. Empty means no address can be formed here.
    pub fn query(&self, lat: f64, lon: f64) -> Vec<&SpatialEdge> {
        let (lower, upper) = geometry::query_window(lat, lon);
        let window = AABB::from_corners(lower, upper);
        self.tree
            .locate_in_envelope_intersecting(&window)
            .map(|entry| &self.edges[entry.data])
            .collect()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Persist as the `rtree.idx` / `rtree.dat` pair in `dir`.
    ///
    /// Both files are written to temp paths and renamed into place, so a
    /// concurrent reader observes either the old pair or the new one.
    pub fn save(&self, dir: &Path) -> Result<()> {
        write_atomic(&dir.join(INDEX_FILE), encode(&self.tree)?)?;
        write_atomic(&dir.join(DATA_FILE), encode(&self.edges)?)?;
        info!("spatial index saved to {}", dir.display());
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let tree = decode(&dir.join(INDEX_FILE))?;
        let edges = decode(&dir.join(DATA_FILE))?;
        Ok(Self { tree, edges })
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| Error::IndexCodec(e.to_string()))
}

fn decode<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let (value, _) = bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
        .map_err(|e| Error::IndexCodec(e.to_string()))?;
    Ok(value)
}

fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<()> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("bin");
    let tmp = path.with_extension(format!("{ext}.tmp"));
    fs::write(&tmp, bytes).map_err(|e| Error::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| Error::io(path, e))
}
