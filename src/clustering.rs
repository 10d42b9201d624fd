//! External region-clustering capability.
//!
//! The core prepares the weighted affinity matrix and consumes one label per
//! node; the clustering algorithm itself lives behind [`RegionClusterer`] and
//! is swappable without touching graph construction.

use std::io::Write;
use std::process::{Command, Stdio};

use log::info;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::roadgraph::AdjacencyMatrix;
use crate::roadgraph::component::MatrixEntry;

/// One region per roughly this many roads.
pub const ROADS_PER_REGION: usize = 88;

/// Cluster count for a network of `road_count` roads.
pub fn cluster_count(road_count: usize) -> usize {
    road_count / ROADS_PER_REGION + 1
}

/// A clustering backend: partitions the affinity matrix's nodes into
/// `clusters` groups and returns one label in `0..clusters` per node.
///
/// The call is blocking and non-cancellable; callers must tolerate arbitrary
/// latency.
pub trait RegionClusterer {
    fn cluster(&self, matrix: &AdjacencyMatrix, clusters: usize) -> Result<Vec<usize>>;
}

#[derive(Serialize)]
struct MatrixPayload<'a> {
    dim: usize,
    clusters: usize,
    entries: &'a [MatrixEntry],
}

/// Shells out to an external clustering command.
///
/// The matrix is piped to the command's stdin as
/// `{"dim": n, "clusters": k, "entries": [[i, j, w], ...]}`; the command must
/// print a JSON array of `n` labels to stdout.
pub struct CommandClusterer {
    program: String,
    args: Vec<String>,
}

impl CommandClusterer {
    pub fn new(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::Clustering("empty clustering command".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl RegionClusterer for CommandClusterer {
    fn cluster(&self, matrix: &AdjacencyMatrix, clusters: usize) -> Result<Vec<usize>> {
        let entries = matrix.entries();
        let payload = MatrixPayload {
            dim: matrix.dim(),
            clusters,
            entries: &entries,
        };
        let input = serde_json::to_vec(&payload)
            .map_err(|e| Error::Clustering(format!("payload encoding: {e}")))?;

        info!(
            "clustering {} nodes into {} regions via '{}'",
            matrix.dim(),
            clusters,
            self.program
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Clustering(format!("spawn '{}': {e}", self.program)))?;
        {
            let mut stdin = child.stdin.take().ok_or_else(|| {
                Error::Clustering(format!("'{}' has no stdin handle", self.program))
            })?;
            stdin
                .write_all(&input)
                .map_err(|e| Error::Clustering(format!("write to '{}': {e}", self.program)))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| Error::Clustering(format!("wait for '{}': {e}", self.program)))?;
        if !output.status.success() {
            return Err(Error::Clustering(format!(
                "'{}' exited with {}",
                self.program, output.status
            )));
        }

        let labels: Vec<usize> = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::Clustering(format!("label parsing: {e}")))?;
        validate_labels(&labels, matrix.dim(), clusters)?;
        Ok(labels)
    }
}

/// Reject malformed label assignments before they reach the namer.
pub fn validate_labels(labels: &[usize], dim: usize, clusters: usize) -> Result<()> {
    if labels.len() != dim {
        return Err(Error::Clustering(format!(
            "expected {dim} labels, got {}",
            labels.len()
        )));
    }
    if let Some(&bad) = labels.iter().find(|&&l| l >= clusters) {
        return Err(Error::Clustering(format!(
            "label {bad} out of range for {clusters} clusters"
        )));
    }
    Ok(())
}
