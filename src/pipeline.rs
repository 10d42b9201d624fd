//! One-shot batch orchestration: road-network JSON in, named roads, road
//! network XML and a persisted spatial index out.
//!
//! Every stage fully consumes its input before the next starts; the only
//! blocking external call is the clustering backend.

use std::path::Path;

use log::info;

use crate::clustering::{RegionClusterer, cluster_count, validate_labels};
use crate::error::Result;
use crate::formats::{self, NamedRoads, RoadNetwork};
use crate::geometry::{GeoBounds, PixelMapper};
use crate::naming;
use crate::osm;
use crate::roadgraph;
use crate::spatial::RoadSpatialIndex;

pub const NAME_TO_ROAD_FILE: &str = "name_to_road.json";

/// Cluster the intersection graph and name every road.
///
/// `center` is the city center in pixel (row, col) space; it defaults to the
/// raster's midpoint.
pub fn build_named_roads(
    network: &RoadNetwork,
    clusterer: &dyn RegionClusterer,
    center: Option<(f64, f64)>,
) -> Result<NamedRoads> {
    info!("building intersection graph over {} roads", network.roads.len());
    let mut graph = roadgraph::build_intersection_graph(&network.roads, &network.pixel_to_road);

    let blacklist = roadgraph::merge_supernodes(&mut graph);
    let component = roadgraph::extract_largest_component(&graph, &blacklist);

    let clusters = cluster_count(network.roads.len());
    let labels = clusterer.cluster(&component.matrix, clusters)?;
    validate_labels(&labels, component.matrix.dim(), clusters)?;

    let centroids = naming::region_centroids(&labels, &component.positions);
    let center = center.unwrap_or((
        f64::from(network.meta.height) / 2.0,
        f64::from(network.meta.width) / 2.0,
    ));
    let region_names = naming::name_regions(&centroids, center)?;
    info!("named {} regions", region_names.len());

    let roads = naming::name_roads(&network.roads, &labels, &component.positions, &region_names);
    info!("named {} of {} roads", roads.len(), network.roads.len());

    Ok(NamedRoads {
        meta: network.meta,
        roads,
    })
}

/// Run the whole pipeline and persist every artifact under `out_dir`:
/// `name_to_road.json`, `roads.osm`, and the `rtree.idx`/`rtree.dat` pair.
pub fn build_artifacts(
    network: &RoadNetwork,
    clusterer: &dyn RegionClusterer,
    bounds: GeoBounds,
    center: Option<(f64, f64)>,
    out_dir: &Path,
) -> Result<NamedRoads> {
    let named = build_named_roads(network, clusterer, center)?;

    formats::write_name_to_road(&out_dir.join(NAME_TO_ROAD_FILE), &named)?;

    let mapper = PixelMapper::new(bounds, named.meta);
    let osm_path = out_dir.join(osm::ROADS_OSM_FILE);
    osm::write_roads_osm(&osm_path, &named, &bounds, &mapper)?;

    // The index is built from the exported document rather than the in-memory
    // roads, so the persisted pair always agrees with what a reader of the
    // XML would see.
    let document = osm::read_roads_osm(&osm_path)?;
    let index = RoadSpatialIndex::build(&document.way_geometries(), 0.0);
    index.save(out_dir)?;

    Ok(named)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::RegionClusterer;
    use crate::error::Error;
    use crate::formats::{ImageMeta, RoadId, RoadPoint};
    use crate::geocode;
    use crate::geometry::haversine;
    use crate::roadgraph::AdjacencyMatrix;
    use ahash::AHashMap;
    use std::collections::BTreeMap;

    /// Everything in one region; enough for a single-component street grid.
    struct OneRegion;

    impl RegionClusterer for OneRegion {
        fn cluster(&self, matrix: &AdjacencyMatrix, _clusters: usize) -> Result<Vec<usize>> {
            Ok(vec![0; matrix.dim()])
        }
    }

    fn grid_network() -> RoadNetwork {
        // Three horizontal and three vertical roads crossing on a 200x200
        // raster.
        let mut roads: BTreeMap<RoadId, Vec<RoadPoint>> = BTreeMap::new();
        let mut id = 1;
        for row in [50i64, 100, 150] {
            roads.insert(id, (20..181).map(|c| RoadPoint::new(row, c, 0.0)).collect());
            id += 1;
        }
        for col in [50i64, 100, 150] {
            roads.insert(id, (20..181).map(|r| RoadPoint::new(r, col, 0.0)).collect());
            id += 1;
        }

        let mut pixel_to_road = AHashMap::new();
        for (&id, points) in &roads {
            for p in points {
                pixel_to_road.insert(p.pixel, id);
            }
        }

        RoadNetwork {
            roads,
            pixel_to_road,
            meta: ImageMeta {
                height: 200,
                width: 200,
            },
        }
    }

    #[test]
    fn grid_roads_all_end_up_named_in_the_center_region() {
        let network = grid_network();
        let named = build_named_roads(&network, &OneRegion, None).unwrap();
        assert_eq!(named.roads.len(), 6);
        assert!(named.roads.keys().all(|name| name.starts_with("CA")));

        let evens = named
            .roads
            .keys()
            .filter(|n| n.trim_start_matches("CA").parse::<u32>().unwrap() % 2 == 0)
            .count();
        assert_eq!(evens, 3);
    }

    #[test]
    fn wrong_label_count_from_the_backend_is_rejected() {
        struct Short;
        impl RegionClusterer for Short {
            fn cluster(&self, _matrix: &AdjacencyMatrix, _clusters: usize) -> Result<Vec<usize>> {
                Ok(vec![0])
            }
        }
        let network = grid_network();
        assert!(matches!(
            build_named_roads(&network, &Short, None),
            Err(Error::Clustering(_))
        ));
    }

    #[test]
    fn end_to_end_artifacts_support_both_geocode_directions() {
        let dir = std::env::temp_dir().join(format!("gridcode-e2e-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let network = grid_network();
        let bounds = GeoBounds {
            min_lat: 40.00,
            min_lon: -75.01,
            max_lat: 40.01,
            max_lon: -75.00,
        };
        let named = build_artifacts(&network, &OneRegion, bounds, None, &dir).unwrap();
        assert!(!named.roads.is_empty());

        // Reload every artifact the way the geocoder binary would.
        let index = RoadSpatialIndex::load(&dir).unwrap();
        let reloaded = formats::load_name_to_road(&dir.join(NAME_TO_ROAD_FILE)).unwrap();
        let document = osm::read_roads_osm(&dir.join(osm::ROADS_OSM_FILE)).unwrap();
        let mapper = PixelMapper::new(document.bounds, reloaded.meta);

        // Query just off the middle horizontal road.
        let query = [
            mapper.to_lat_lon(100, 120)[0] + 0.00008,
            mapper.to_lat_lon(100, 120)[1],
        ];
        let address = geocode::forward(&index, query[0], query[1], "gotham").unwrap();
        assert!(address.road.starts_with("CA"));

        let recovered = geocode::reverse(
            &reloaded,
            &mapper,
            address.meters,
            address.block,
            &address.road,
        )
        .unwrap();
        let drift = haversine(query, recovered);
        assert!(drift < 12.0, "round trip drifted {drift} m");

        // Far outside the raster there is nothing to address.
        assert!(matches!(
            geocode::forward(&index, 41.0, -75.0, "gotham"),
            Err(Error::NoAddressFound)
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn extraction_leaves_a_single_component() {
        let network = grid_network();
        let mut graph =
            roadgraph::build_intersection_graph(&network.roads, &network.pixel_to_road);
        let blacklist = roadgraph::merge_supernodes(&mut graph);
        let component = roadgraph::extract_largest_component(&graph, &blacklist);
        assert!(component.matrix.dim() > 0);
        assert_eq!(component.matrix.component_count(), 1);
    }
}
