//! Region and road naming.
//!
//! Regions are named `<cardinal><letter>` by centroid orientation from the
//! city center (the closest region is always `CA`); roads are named
//! `<region><index>` where the index's parity encodes which of the region's
//! two dominant axes the road follows.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use log::warn;

use crate::error::{Error, Result};
use crate::formats::{PixelPoint, RoadId, RoadPoint};

const CARDINALS: [char; 4] = ['N', 'S', 'E', 'W'];

/// Orientation histogram resolution for road axis detection.
const ORIENTATION_BUCKETS: usize = 8;
const BUCKET_DEGREES: f64 = 180.0 / ORIENTATION_BUCKETS as f64;

fn euclid(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dr = a.0 - b.0;
    let dc = a.1 - b.1;
    (dr * dr + dc * dc).sqrt()
}

/// Angle of `p2` as seen from `p1`, degrees in `[0, 360)`.
fn angle_between(p1: (f64, f64), p2: (f64, f64)) -> f64 {
    let angle = (p2.1 - p1.1).atan2(p2.0 - p1.0).to_degrees();
    if angle < 0.0 { angle + 360.0 } else { angle }
}

/// Compass bucket of a centroid relative to the center: index into
/// [`CARDINALS`].
fn compass_bucket(centroid: (f64, f64), center: (f64, f64)) -> usize {
    let angle = (angle_between(center, centroid) + 180.0 + 45.0) % 360.0;
    match angle {
        a if a < 90.0 => 0,  // N
        a if a < 180.0 => 3, // W
        a if a < 270.0 => 1, // S
        _ => 2,              // E
    }
}

/// Mean pixel position of each cluster label.
pub fn region_centroids(labels: &[usize], positions: &[PixelPoint]) -> BTreeMap<usize, (f64, f64)> {
    let mut sums: BTreeMap<usize, (f64, f64, usize)> = BTreeMap::new();
    for (&label, pos) in labels.iter().zip(positions) {
        let entry = sums.entry(label).or_insert((0.0, 0.0, 0));
        entry.0 += pos.row as f64;
        entry.1 += pos.col as f64;
        entry.2 += 1;
    }
    sums.into_iter()
        .map(|(label, (r, c, n))| (label, (r / n as f64, c / n as f64)))
        .collect()
}

/// Assign a two-letter name to every region.
///
/// Regions are visited by centroid distance from the center; the closest one
/// is always `CA`, every other draws the next unused letter from its compass
/// bucket (`A..Z` minus the easily-confused `I` and `O`). An exhausted
/// bucket is fatal: the remaining regions would have no address space.
pub fn name_regions(
    centroids: &BTreeMap<usize, (f64, f64)>,
    center: (f64, f64),
) -> Result<BTreeMap<usize, String>> {
    let letters: Vec<char> = ('A'..='Z').filter(|&c| c != 'I' && c != 'O').collect();
    let mut next_letter = [0usize; 4];

    let mut ordered: Vec<(usize, (f64, f64))> = centroids.iter().map(|(&l, &c)| (l, c)).collect();
    ordered.sort_by(|a, b| {
        euclid(center, a.1)
            .partial_cmp(&euclid(center, b.1))
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let mut names = BTreeMap::new();
    for (rank, (label, centroid)) in ordered.into_iter().enumerate() {
        let name = if rank == 0 {
            "CA".to_string()
        } else {
            let bucket = compass_bucket(centroid, center);
            let slot = next_letter[bucket];
            if slot >= letters.len() {
                return Err(Error::RegionBudgetExceeded);
            }
            next_letter[bucket] += 1;
            format!("{}{}", CARDINALS[bucket], letters[slot])
        };
        names.insert(label, name);
    }
    Ok(names)
}

/// Chord orientation of a road in degrees, `None` when the road is too short
/// to measure (fewer than five points or a degenerate chord).
///
/// The angle is taken at the chord's midpoint between the lower-row endpoint
/// and a fixed reference offset along the column axis, so 90 degrees means a
/// road running down the raster.
fn road_angle(points: &[RoadPoint]) -> Option<f64> {
    if points.len() <= 4 {
        return None;
    }
    let start = points[1].pixel;
    let end = points[points.len() - 2].pixel;
    let low = if end.row < start.row { end } else { start };
    let low = (low.row as f64, low.col as f64);

    let mid = (
        (start.row + end.row) as f64 / 2.0,
        (start.col + end.col) as f64 / 2.0,
    );
    let reference = (mid.0, mid.1 + 100.0);

    let a = euclid(low, mid);
    let b = euclid(reference, mid);
    let c = euclid(low, reference);
    if a == 0.0 {
        return None;
    }

    let cos = ((a * a + b * b - c * c) / (2.0 * a * b)).clamp(-1.0, 1.0);
    let angle = cos.acos().to_degrees();
    if angle == 0.0 { None } else { Some(angle) }
}

/// Rotate a pixel-space vector by `theta` degrees.
fn rotate(point: (f64, f64), theta: f64) -> (f64, f64) {
    let theta = theta.to_radians();
    (
        point.0 * theta.cos() - point.1 * theta.sin(),
        point.0 * theta.sin() + point.1 * theta.cos(),
    )
}

/// Clock-hand distance between `a` and `b` modulo `n`.
fn mod_dist(a: f64, b: f64, n: f64) -> f64 {
    ((a - b).rem_euclid(n)).min((b - a).rem_euclid(n))
}

struct RegionRoad {
    id: RoadId,
    avg: (f64, f64),
    angle: Option<f64>,
}

/// Name every road `<region><index>` and return the name -> polyline map.
///
/// A road belongs to the region of the labeled intersection nearest to its
/// first pixel. Within a region, measurable roads vote into eight
/// orientation buckets; the two most popular non-adjacent buckets become the
/// region's axes (the more north-south one first). Roads on the first axis
/// take even indices 10, 12, ..., roads on the second odd indices 11, 13,
/// ..., ordered along the rotated axis. Roads without a measurable
/// orientation stay unnamed and are dropped.
pub fn name_roads(
    roads: &BTreeMap<RoadId, Vec<RoadPoint>>,
    labels: &[usize],
    positions: &[PixelPoint],
    region_names: &BTreeMap<usize, String>,
) -> BTreeMap<String, Vec<RoadPoint>> {
    let mut named = BTreeMap::new();
    if positions.is_empty() {
        warn!("no labeled intersections; no roads can be named");
        return named;
    }

    // Bucket roads by the region of the nearest labeled intersection.
    let mut by_region: BTreeMap<usize, Vec<RegionRoad>> = BTreeMap::new();
    for (&id, points) in roads {
        let Some(first) = points.first() else {
            continue;
        };
        let Some(nearest) = (0..positions.len()).min_by(|&a, &b| {
            positions[a]
                .dist(&first.pixel)
                .partial_cmp(&positions[b].dist(&first.pixel))
                .unwrap_or(Ordering::Equal)
        }) else {
            continue;
        };

        let count = points.len() as f64;
        let avg = (
            points.iter().map(|p| p.pixel.row as f64).sum::<f64>() / count,
            points.iter().map(|p| p.pixel.col as f64).sum::<f64>() / count,
        );
        by_region.entry(labels[nearest]).or_default().push(RegionRoad {
            id,
            avg,
            angle: road_angle(points),
        });
    }

    for (label, region_roads) in by_region {
        let Some(region) = region_names.get(&label) else {
            warn!("cluster label {label} has no region name; skipping its roads");
            continue;
        };

        let mut gradients = [0usize; ORIENTATION_BUCKETS];
        for road in &region_roads {
            if let Some(angle) = road.angle {
                gradients[(angle / BUCKET_DEGREES).round() as usize % ORIENTATION_BUCKETS] += 1;
            }
        }

        // Two most popular non-adjacent buckets become the region's axes.
        let mut order: Vec<usize> = (0..ORIENTATION_BUCKETS).collect();
        order.sort_by_key(|&i| (gradients[i], i));
        let mut primary = order[ORIENTATION_BUCKETS - 1];
        let mut secondary = order[ORIENTATION_BUCKETS - 2];
        let mut rest = order[..ORIENTATION_BUCKETS - 2].to_vec();
        while mod_dist(primary as f64, secondary as f64, ORIENTATION_BUCKETS as f64) <= 1.0 {
            match rest.pop() {
                Some(next) => secondary = next,
                None => break,
            }
        }
        // The first axis is the more north-south one.
        if (2..=5).contains(&primary) {
            std::mem::swap(&mut primary, &mut secondary);
        }

        let axes = [primary, secondary];
        let mut groups: [Vec<&RegionRoad>; 2] = [Vec::new(), Vec::new()];
        for road in &region_roads {
            let Some(angle) = road.angle else {
                continue;
            };
            let slot = angle / BUCKET_DEGREES;
            let n = ORIENTATION_BUCKETS as f64;
            if mod_dist(slot, primary as f64, n) < mod_dist(slot, secondary as f64, n) {
                groups[0].push(road);
            } else {
                groups[1].push(road);
            }
        }

        for (parity, group) in groups.iter_mut().enumerate() {
            let theta = axes[parity] as f64 * BUCKET_DEGREES;
            group.sort_by(|a, b| {
                rotate(b.avg, theta)
                    .0
                    .partial_cmp(&rotate(a.avg, theta).0)
                    .unwrap_or(Ordering::Equal)
            });

            let mut index = 10 + parity;
            for road in group.iter() {
                named.insert(format!("{region}{index}"), roads[&road.id].clone());
                index += 2;
            }
        }
    }

    named
}
