//! Collapses near-duplicate intersections into supernodes.

use ahash::AHashSet;
use log::debug;

use crate::roadgraph::IntersectionGraph;

/// Two nodes closer than this many pixel units collapse into one.
pub const MERGE_THRESHOLD: f64 = 7.0;

/// Merge every pair of live nodes within [`MERGE_THRESHOLD`] of each other.
///
/// Pairs are scanned in node-id order, and the second node of a matching
/// pair is absorbed into the first: its neighbor set is unioned into the
/// survivor, every third node's edge to it is redirected to the survivor
/// (never forming a self-loop), and its own set is emptied. An absorbed node
/// fails the non-empty check on later scans, so it cannot be absorbed twice;
/// the result is the union-of-first-match, not a ranked union-find.
///
/// Returns the ids of absorbed nodes, the blacklist consumed by component
/// extraction.
pub fn merge_supernodes(graph: &mut IntersectionGraph) -> AHashSet<usize> {
    let mut blacklist = AHashSet::new();
    let n = graph.len();

    for a in 0..n {
        for b in 0..n {
            if a == b {
                continue;
            }
            {
                let adjacency = graph.adjacency_mut();
                if adjacency[a].is_empty() || adjacency[b].is_empty() {
                    continue;
                }
            }
            if graph.position(a).dist(&graph.position(b)) >= MERGE_THRESHOLD {
                continue;
            }

            let adjacency = graph.adjacency_mut();
            let absorbed = std::mem::take(&mut adjacency[b]);
            adjacency[a].extend(absorbed.iter().copied().filter(|&c| c != a));
            adjacency[a].remove(&b);
            for &c in &absorbed {
                if c == a {
                    continue;
                }
                adjacency[c].remove(&b);
                adjacency[c].insert(a);
            }
            blacklist.insert(b);
        }
    }

    debug!(
        "supernode merge: absorbed {} of {} nodes",
        blacklist.len(),
        n
    );
    blacklist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::PixelPoint;

    fn graph_of(points: &[(i64, i64)], edges: &[(usize, usize)]) -> IntersectionGraph {
        let mut graph = IntersectionGraph::new();
        for &(r, c) in points {
            graph.ensure_node(PixelPoint::new(r, c));
        }
        for &(a, b) in edges {
            graph.add_edge(a, b);
        }
        graph
    }

    #[test]
    fn no_two_survivors_within_threshold() {
        // Three mutually-close junctions plus two distant anchors.
        let mut graph = graph_of(
            &[(0, 0), (0, 3), (3, 0), (100, 0), (0, 100)],
            &[(0, 3), (1, 3), (2, 4), (0, 4)],
        );
        let blacklist = merge_supernodes(&mut graph);
        assert!(!blacklist.is_empty());

        let live: Vec<usize> = (0..graph.len())
            .filter(|&i| !graph.neighbors(i).is_empty())
            .collect();
        for (i, &x) in live.iter().enumerate() {
            for &y in &live[i + 1..] {
                assert!(
                    graph.position(x).dist(&graph.position(y)) >= MERGE_THRESHOLD,
                    "nodes {x} and {y} are both live but within the merge threshold"
                );
            }
        }
    }

    #[test]
    fn absorbed_neighbors_reattach_to_survivor() {
        // 1 sits next to 0; 1's only neighbor is 3.
        let mut graph = graph_of(&[(0, 0), (0, 2), (50, 50), (90, 90)], &[(0, 2), (1, 3)]);
        let blacklist = merge_supernodes(&mut graph);

        assert!(blacklist.contains(&1));
        assert!(graph.neighbors(1).is_empty());
        // The survivor inherited the absorbed node's neighbor, and the
        // neighbor's back-edge was redirected.
        assert!(graph.neighbors(0).contains(&3));
        assert!(graph.neighbors(3).contains(&0));
        assert!(!graph.neighbors(3).contains(&1));
    }

    #[test]
    fn merge_never_creates_self_loops() {
        // 0 and 1 are close and directly connected.
        let mut graph = graph_of(&[(0, 0), (0, 2), (40, 40)], &[(0, 1), (1, 2)]);
        merge_supernodes(&mut graph);
        for i in 0..graph.len() {
            assert!(!graph.neighbors(i).contains(&i), "self-loop on node {i}");
        }
    }

    #[test]
    fn distant_nodes_are_untouched() {
        let mut graph = graph_of(&[(0, 0), (100, 100), (200, 0)], &[(0, 1), (1, 2)]);
        let blacklist = merge_supernodes(&mut graph);
        assert!(blacklist.is_empty());
        assert_eq!(graph.neighbors(1).len(), 2);
    }
}
