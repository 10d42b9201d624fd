//! Builds the intersection graph from raw per-road pixel sequences.

use std::collections::BTreeMap;

use ahash::AHashMap;
use log::debug;

use crate::formats::{PixelPoint, RoadId, RoadPoint};
use crate::roadgraph::IntersectionGraph;

/// Window half-width scanned around every road pixel. A window rather than an
/// exact-pixel match tolerates T-junctions and anti-aliasing where two roads
/// are separated by a pixel or two.
const JUNCTION_WINDOW: i64 = 2;

/// Walk every road and record an intersection edge whenever a pixel of a
/// *different* road appears inside the scan window.
///
/// Each road carries a running "previous junction" pixel, seeded with the
/// road's first point; every detected junction links back to it and then
/// becomes the new previous junction, so the road contributes a chain of
/// edges along its length.
pub fn build_intersection_graph(
    roads: &BTreeMap<RoadId, Vec<RoadPoint>>,
    pixel_to_road: &AHashMap<PixelPoint, RoadId>,
) -> IntersectionGraph {
    let mut graph = IntersectionGraph::new();

    for (&road_id, points) in roads {
        let Some(first) = points.first() else {
            continue;
        };
        let mut prev = graph.ensure_node(first.pixel);

        for point in points {
            for dr in -JUNCTION_WINDOW..=JUNCTION_WINDOW {
                for dc in -JUNCTION_WINDOW..=JUNCTION_WINDOW {
                    let probe = PixelPoint::new(point.pixel.row + dr, point.pixel.col + dc);
                    let Some(&other) = pixel_to_road.get(&probe) else {
                        continue;
                    };
                    if other == road_id {
                        continue;
                    }
                    let curr = graph.ensure_node(point.pixel);
                    graph.add_edge(prev, curr);
                    prev = curr;
                }
            }
        }
    }

    debug!("intersection graph: {} nodes", graph.len());
    graph
}
