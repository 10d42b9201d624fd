//! Coordinate conversion and small-scale spherical geometry.
//!
//! Coordinates are `[f64; 2]` arrays ordered `[lat, lon]`, matching the
//! spatial index's envelope axes. Pixel space is row/column with row 0 at the
//! top of the image, so latitude decreases as the row index grows.

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use crate::formats::ImageMeta;

/// Half side of the square query window used for candidate lookup, in km.
pub const QUERY_HALF_SIDE_KM: f64 = 0.13;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in meters between two `[lat, lon]` coordinates.
pub fn haversine(a: [f64; 2], b: [f64; 2]) -> f64 {
    Point::new(a[1], a[0]).haversine_distance(&Point::new(b[1], b[0]))
}

/// Geographic bounding box of the mapped area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

/// Pixel row/column to latitude/longitude conversion for one raster.
///
/// Built once per run from the raster's bounding box and dimensions and
/// passed by reference to every consumer.
#[derive(Debug, Clone, Copy)]
pub struct PixelMapper {
    min_lat: f64,
    min_lon: f64,
    lat_range: f64,
    lon_range: f64,
    rows: f64,
    cols: f64,
}

impl PixelMapper {
    pub fn new(bounds: GeoBounds, meta: ImageMeta) -> Self {
        Self {
            min_lat: bounds.min_lat,
            min_lon: bounds.min_lon,
            lat_range: bounds.max_lat - bounds.min_lat,
            lon_range: bounds.max_lon - bounds.min_lon,
            rows: f64::from(meta.height),
            cols: f64::from(meta.width),
        }
    }

    pub fn row_to_lat(&self, row: f64) -> f64 {
        ((self.rows - row) * self.lat_range) / self.rows + self.min_lat
    }

    pub fn col_to_lon(&self, col: f64) -> f64 {
        (col * self.lon_range) / self.cols + self.min_lon
    }

    pub fn to_lat_lon(&self, row: i64, col: i64) -> [f64; 2] {
        [self.row_to_lat(row as f64), self.col_to_lon(col as f64)]
    }
}

/// Square window of ~[`QUERY_HALF_SIDE_KM`] half-side around a coordinate,
/// returned as `(lower, upper)` corners in `[lat, lon]`.
pub fn query_window(lat: f64, lon: f64) -> ([f64; 2], [f64; 2]) {
    debug_assert!((-90.0..=90.0).contains(&lat));
    debug_assert!((-180.0..=180.0).contains(&lon));

    let lat_rad = lat.to_radians();
    let lon_rad = lon.to_radians();
    // Radius of the parallel at the query latitude.
    let parallel_radius = EARTH_RADIUS_KM * lat_rad.cos();

    let lat_min = lat_rad - QUERY_HALF_SIDE_KM / EARTH_RADIUS_KM;
    let lat_max = lat_rad + QUERY_HALF_SIDE_KM / EARTH_RADIUS_KM;
    let lon_min = lon_rad - QUERY_HALF_SIDE_KM / parallel_radius;
    let lon_max = lon_rad + QUERY_HALF_SIDE_KM / parallel_radius;

    (
        [lat_min.to_degrees(), lon_min.to_degrees()],
        [lat_max.to_degrees(), lon_max.to_degrees()],
    )
}

/// Axis-aligned bounding box of a segment, padded on every side.
pub fn segment_bbox(a: [f64; 2], b: [f64; 2], pad: f64) -> ([f64; 2], [f64; 2]) {
    (
        [a[0].min(b[0]) - pad, a[1].min(b[1]) - pad],
        [a[0].max(b[0]) + pad, a[1].max(b[1]) + pad],
    )
}

/// Whether `p` lies within the span of segment `a`-`b`, checked along the
/// segment's varying axis.
fn within_span(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> bool {
    let axis = if a[0] != b[0] { 0 } else { 1 };
    let (lo, hi) = if a[axis] < b[axis] {
        (a[axis], b[axis])
    } else {
        (b[axis], a[axis])
    };
    lo < p[axis] && p[axis] < hi
}

/// Point on segment `a`-`b` closest to `q`.
///
/// Planar-approximation projection, valid at the short distances the query
/// window admits: axis-aligned segments project directly, anything else
/// intersects the segment's line with its perpendicular through `q`. A
/// projection landing outside the segment's span falls back to the nearer
/// endpoint.
pub fn closest_point_on_segment(a: [f64; 2], b: [f64; 2], q: [f64; 2]) -> [f64; 2] {
    let projected = if a[0] == b[0] {
        [a[0], q[1]]
    } else if a[1] == b[1] {
        [q[0], a[1]]
    } else {
        let m1 = (b[1] - a[1]) / (b[0] - a[0]);
        let m2 = -1.0 / m1;
        let x = (m1 * a[0] - m2 * q[0] + q[1] - a[1]) / (m1 - m2);
        let y = m2 * (x - q[0]) + q[1];
        [x, y]
    };

    if within_span(a, b, projected) {
        projected
    } else if haversine(a, q) <= haversine(b, q) {
        a
    } else {
        b
    }
}

/// Point `along_m` meters from `a` towards `b`, shifted `orth_m` meters
/// perpendicular to the segment. `positive_side` selects which side of the
/// segment the shift lands on; it is the inverse of the cross-product sign
/// the forward geocoder folds into the address parity.
///
/// `along_m` beyond the segment's length clamps to the far endpoint, so an
/// address past the end of a road resolves to the road's end.
pub fn offset_from_segment(
    a: [f64; 2],
    b: [f64; 2],
    along_m: f64,
    orth_m: f64,
    positive_side: bool,
) -> [f64; 2] {
    let seg_len = haversine(a, b);
    if seg_len == 0.0 {
        return a;
    }

    let frac = (along_m / seg_len).clamp(0.0, 1.0);
    let dir = [b[0] - a[0], b[1] - a[1]];
    let target = [a[0] + dir[0] * frac, a[1] + dir[1] * frac];

    let perp = [-dir[1], dir[0]];
    let norm = (perp[0] * perp[0] + perp[1] * perp[1]).sqrt();
    if norm == 0.0 {
        return target;
    }
    let unit = [perp[0] / norm, perp[1] / norm];

    // Ground length of one degree-space unit of the perpendicular at the
    // target, probed over a small step to stay in the linear regime.
    const PROBE: f64 = 1e-4;
    let probe_point = [target[0] + unit[0] * PROBE, target[1] + unit[1] * PROBE];
    let meters_per_unit = haversine(target, probe_point) / PROBE;
    if meters_per_unit == 0.0 {
        return target;
    }

    let scale = orth_m / meters_per_unit;
    if positive_side {
        [target[0] + unit[0] * scale, target[1] + unit[1] * scale]
    } else {
        [target[0] - unit[0] * scale, target[1] - unit[1] * scale]
    }
}
