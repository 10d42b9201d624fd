//! Largest-connected-component extraction over a weighted sparse matrix.

use std::collections::VecDeque;

use ahash::AHashSet;
use log::debug;
use serde::Serialize;

use crate::formats::PixelPoint;
use crate::roadgraph::IntersectionGraph;

/// Symmetric weighted sparse adjacency matrix.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyMatrix {
    dim: usize,
    rows: Vec<Vec<(usize, f64)>>,
}

/// Upper-triangular entry of the matrix, the wire form handed to external
/// clustering backends.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MatrixEntry(pub usize, pub usize, pub f64);

impl AdjacencyMatrix {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            rows: vec![Vec::new(); dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Set the symmetric entry `(i, j)` / `(j, i)`.
    pub fn set(&mut self, i: usize, j: usize, weight: f64) {
        debug_assert!(i < self.dim && j < self.dim);
        Self::set_row(&mut self.rows[i], j, weight);
        Self::set_row(&mut self.rows[j], i, weight);
    }

    fn set_row(row: &mut Vec<(usize, f64)>, col: usize, weight: f64) {
        match row.binary_search_by_key(&col, |&(c, _)| c) {
            Ok(pos) => row[pos].1 = weight,
            Err(pos) => row.insert(pos, (col, weight)),
        }
    }

    pub fn neighbors(&self, i: usize) -> &[(usize, f64)] {
        &self.rows[i]
    }

    /// Upper-triangular non-zero entries, in row-major order.
    pub fn entries(&self) -> Vec<MatrixEntry> {
        let mut out = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            for &(j, w) in row {
                if i <= j {
                    out.push(MatrixEntry(i, j, w));
                }
            }
        }
        out
    }

    /// Component label per node, labels assigned in node-id order.
    pub fn connected_components(&self) -> Vec<usize> {
        component_labels(self.dim, |i| {
            self.rows[i].iter().map(|&(j, _)| j).collect()
        })
    }

    pub fn component_count(&self) -> usize {
        self.connected_components()
            .iter()
            .max()
            .map_or(0, |&m| m + 1)
    }
}

fn component_labels(dim: usize, neighbors: impl Fn(usize) -> Vec<usize>) -> Vec<usize> {
    let mut labels = vec![usize::MAX; dim];
    let mut next = 0;
    let mut queue = VecDeque::new();

    for start in 0..dim {
        if labels[start] != usize::MAX {
            continue;
        }
        labels[start] = next;
        queue.push_back(start);
        while let Some(node) = queue.pop_front() {
            for other in neighbors(node) {
                if labels[other] == usize::MAX {
                    labels[other] = next;
                    queue.push_back(other);
                }
            }
        }
        next += 1;
    }
    labels
}

/// The largest connected component of the merged intersection graph:
/// contiguously re-indexed nodes, their pixel positions, and the rebuilt
/// weighted matrix.
#[derive(Debug)]
pub struct ComponentGraph {
    pub matrix: AdjacencyMatrix,
    /// New node id -> pixel position, relative order of original ids kept.
    pub positions: Vec<PixelPoint>,
}

/// Restrict the graph to nodes that survived supernode merging and belong to
/// the most populous connected component, re-indexed to `0..n`.
///
/// Minority components are silently discarded: clustering does not converge
/// on a disconnected affinity matrix. Ties on component population break
/// towards the first-seen label.
pub fn extract_largest_component(
    graph: &IntersectionGraph,
    blacklist: &AHashSet<usize>,
) -> ComponentGraph {
    let n = graph.len();
    let labels = component_labels(n, |i| graph.neighbors(i).iter().copied().collect());

    let mut counts = vec![0usize; n];
    for &label in &labels {
        counts[label] += 1;
    }
    // Most populous component; ties break towards the first-seen label.
    let mut best = 0;
    for label in 1..n {
        if counts[label] > counts[best] {
            best = label;
        }
    }

    // Survivors keep their relative order; ids become contiguous.
    let mut new_ids = vec![usize::MAX; n];
    let mut positions = Vec::new();
    for id in 0..n {
        if labels[id] == best && !blacklist.contains(&id) {
            new_ids[id] = positions.len();
            positions.push(graph.position(id));
        }
    }

    let mut matrix = AdjacencyMatrix::new(positions.len());
    for id in 0..n {
        let a = new_ids[id];
        if a == usize::MAX {
            continue;
        }
        for &other in graph.neighbors(id) {
            let b = new_ids[other];
            if b == usize::MAX || a >= b {
                continue;
            }
            let weight = graph.position(id).dist(&graph.position(other));
            matrix.set(a, b, weight);
        }
    }

    debug!(
        "largest component: kept {} of {} nodes ({} blacklisted)",
        positions.len(),
        n,
        blacklist.len()
    );
    ComponentGraph { matrix, positions }
}
