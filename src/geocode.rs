//! Forward and reverse geocoding between coordinates and road addresses.

use std::fmt;

use itertools::Itertools;

use crate::error::{Error, Result};
use crate::formats::NamedRoads;
use crate::geometry::{PixelMapper, closest_point_on_segment, haversine, offset_from_segment};
use crate::spatial::RoadSpatialIndex;

/// Both the distance along the road and the orthogonal distance from it are
/// quantized in units of this many meters.
const ADDRESS_UNIT_M: f64 = 5.0;

/// A resolved road address, displayed as `<meters><block>.<road>.<city>`.
///
/// The parity of `meters` encodes which side of the road the addressed point
/// lies on; the block letter encodes the quantized orthogonal distance from
/// the road centerline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub meters: i64,
    pub block: char,
    pub road: String,
    pub city: String,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}.{}.{}", self.meters, self.block, self.road, self.city)
    }
}

/// Resolve a coordinate to the address of the nearest indexed road edge.
pub fn forward(index: &RoadSpatialIndex, lat: f64, lon: f64, city: &str) -> Result<Address> {
    let query = [lat, lon];
    let mut nearest = None;
    for edge in index.query(lat, lon) {
        let closest = closest_point_on_segment(edge.start, edge.end, query);
        let dist = haversine(closest, query);
        match nearest {
            Some((best, _, _)) if dist >= best => {}
            _ => nearest = Some((dist, closest, edge)),
        }
    }
    let Some((orth_dist, closest, edge)) = nearest else {
        return Err(Error::NoAddressFound);
    };

    // Block letter: one letter per 5 m band of orthogonal distance.
    let block = (orth_dist.round() / ADDRESS_UNIT_M + 65.0) as u8 as char;

    // Distance along the road from its start to the projected point, in
    // address units.
    let along = (haversine(closest, edge.start) + edge.distance_along) / ADDRESS_UNIT_M;

    // Side of the road: cross product of the segment direction with the
    // query's offset from the far endpoint, on (lat, lon) components.
    let sign = (edge.end[0] - edge.start[0]) * (lon - edge.end[1])
        - (edge.end[1] - edge.start[1]) * (lat - edge.end[0]);
    let meters = if sign <= 0.0 {
        2 * (along / 2.0).round() as i64
    } else {
        2 * (along / 2.0).round() as i64 + 1
    };

    Ok(Address {
        meters,
        block,
        road: edge.road.clone(),
        city: city.to_string(),
    })
}

/// Resolve an address back to a `[lat, lon]` coordinate.
///
/// Walks the named road from its start, accumulating per-segment distance in
/// address units, until the cumulative distance exceeds `meters`; the target
/// point lies within that segment, shifted perpendicularly by the block
/// letter's distance band on the side the parity bit selects. A `meters`
/// beyond the end of the road clamps to the road's last point.
pub fn reverse(
    roads: &NamedRoads,
    mapper: &PixelMapper,
    meters: i64,
    block: char,
    street: &str,
) -> Result<[f64; 2]> {
    let street = street.to_uppercase();
    let road = roads
        .roads
        .get(&street)
        .ok_or_else(|| Error::StreetNotFound(street.clone()))?;

    let orth_dist = (f64::from(block.to_ascii_uppercase() as u8) - 64.5) * ADDRESS_UNIT_M;

    let points: Vec<[f64; 2]> = road
        .iter()
        .map(|p| mapper.to_lat_lon(p.pixel.row, p.pixel.col))
        .collect();
    if points.len() < 2 {
        // A degenerate road has nowhere to walk; resolve to its lone point.
        return points
            .first()
            .copied()
            .ok_or_else(|| Error::MalformedInput(format!("road {street} has no points")));
    }
    Ok(walk_to_offset(&points, meters, orth_dist))
}

fn walk_to_offset(points: &[[f64; 2]], meters: i64, orth_dist: f64) -> [f64; 2] {
    let target = meters as f64;
    let mut cumulative = 0.0;
    let mut before = 0.0;
    let mut segment = (points[0], points[0]);
    for (&a, &b) in points.iter().tuple_windows() {
        before = cumulative;
        cumulative += haversine(a, b) / ADDRESS_UNIT_M;
        segment = (a, b);
        if cumulative > target {
            break;
        }
    }

    let along_m = (target - before) * ADDRESS_UNIT_M;
    offset_from_segment(segment.0, segment.1, along_m, orth_dist, meters % 2 != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{ImageMeta, RoadPoint};
    use crate::geometry::GeoBounds;
    use std::collections::BTreeMap;

    // 1000x1000 raster over a 0.05-degree square: one pixel is ~5.5 m of
    // latitude, so test roads can be laid out in round pixel counts.
    const BOUNDS: GeoBounds = GeoBounds {
        min_lat: 40.00,
        min_lon: -75.05,
        max_lat: 40.05,
        max_lon: -75.00,
    };
    const META: ImageMeta = ImageMeta {
        height: 1000,
        width: 1000,
    };

    fn mapper() -> PixelMapper {
        PixelMapper::new(BOUNDS, META)
    }

    /// A single named road running down a constant column of the raster.
    fn straight_road(name: &str, col: i64, rows: std::ops::Range<i64>) -> NamedRoads {
        let mut roads = BTreeMap::new();
        roads.insert(
            name.to_string(),
            rows.map(|r| RoadPoint::new(r, col, 0.0)).collect(),
        );
        NamedRoads { meta: META, roads }
    }

    fn index_for(named: &NamedRoads) -> RoadSpatialIndex {
        let m = mapper();
        let ways: Vec<(Vec<[f64; 2]>, String)> = named
            .roads
            .iter()
            .map(|(name, pts)| {
                (
                    pts.iter()
                        .map(|p| m.to_lat_lon(p.pixel.row, p.pixel.col))
                        .collect(),
                    name.clone(),
                )
            })
            .collect();
        RoadSpatialIndex::build(&ways, 0.0)
    }

    #[test]
    fn empty_query_is_no_address_found() {
        let named = straight_road("CA10", 500, 100..110);
        let index = index_for(&named);
        assert!(matches!(
            forward(&index, 41.5, -75.0, "gotham"),
            Err(Error::NoAddressFound)
        ));
    }

    #[test]
    fn unknown_street_is_street_not_found() {
        let named = straight_road("CA10", 500, 100..110);
        let err = reverse(&named, &mapper(), 10, 'a', "zz99").unwrap_err();
        assert!(matches!(err, Error::StreetNotFound(name) if name == "ZZ99"));
    }

    #[test]
    fn forward_meters_parity_tracks_road_side() {
        let named = straight_road("CA10", 500, 100..200);
        let index = index_for(&named);
        let m = mapper();
        let mid = m.to_lat_lon(150, 500);

        // ~32 m east and west of the road.
        let east = forward(&index, mid[0], mid[1] + 0.000375, "gotham").unwrap();
        let west = forward(&index, mid[0], mid[1] - 0.000375, "gotham").unwrap();
        assert_eq!(east.meters % 2, 0);
        assert_eq!(west.meters % 2, 1);
        assert_eq!(east.road, "CA10");

        // ~32 m maps into the seventh 5 m band: letter G.
        assert_eq!(east.block.to_ascii_uppercase(), 'G');
    }

    #[test]
    fn round_trip_recovers_the_query_point() {
        let named = straight_road("CA10", 500, 100..300);
        let index = index_for(&named);
        let m = mapper();

        let on_road = m.to_lat_lon(190, 500);
        let query = [on_road[0], on_road[1] + 0.0002]; // ~17 m east

        let address = forward(&index, query[0], query[1], "gotham").unwrap();
        let recovered = reverse(&named, &m, address.meters, address.block, &address.road).unwrap();

        let error = haversine(query, recovered);
        assert!(
            error < 10.0,
            "round trip drifted {error} m (address {address})"
        );
    }

    #[test]
    fn reverse_lands_between_the_expected_points() {
        // Three points with ~250 m between consecutive ones, i.e. 50
        // address units per segment: cumulative tags 0, 50, 100.
        let m = mapper();
        let mut roads = BTreeMap::new();
        roads.insert(
            "NC17".to_string(),
            vec![
                RoadPoint::new(100, 500, 0.0),
                RoadPoint::new(145, 500, 50.0),
                RoadPoint::new(190, 500, 100.0),
            ],
        );
        let named = NamedRoads { meta: META, roads };

        let target = reverse(&named, &m, 52, 'b', "nc17").unwrap();

        // 52 units lands just past the 50-unit point, inside the second
        // segment.
        let p1 = m.to_lat_lon(145, 500);
        let p2 = m.to_lat_lon(190, 500);
        assert!(target[0] < p1[0] && target[0] > p2[0]);

        // Block letter B puts the point ~7.5 m off the centerline.
        let off_axis = haversine(target, [target[0], -75.05 + 500.0 * 0.05 / 1000.0]);
        assert!((off_axis - 7.5).abs() < 1.0, "offset was {off_axis} m");
    }

    #[test]
    fn meters_past_the_road_end_clamp_to_its_last_point() {
        let named = straight_road("CA10", 500, 100..110);
        let m = mapper();
        let end = m.to_lat_lon(109, 500);
        let target = reverse(&named, &m, 100_000, 'a', "CA10").unwrap();
        // Offset only by the block letter's half-band from the road's end.
        assert!(haversine(target, end) < ADDRESS_UNIT_M);
    }
}
