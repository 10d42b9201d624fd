//! Error taxonomy for the addressing core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The spatial query window around the coordinate contained no road edges.
    #[error("no address found near the queried coordinate")]
    NoAddressFound,

    /// Reverse lookup on a road name that is not on the current map.
    #[error("street {0} was not found on the current map")]
    StreetNotFound(String),

    /// More clusters than available region name slots. Fatal: once naming is
    /// exhausted there is no valid address space for the remaining regions.
    #[error("region name budget exhausted; try a smaller area")]
    RegionBudgetExceeded,

    /// The external clustering backend failed or returned a malformed
    /// label assignment.
    #[error("clustering backend failed: {0}")]
    Clustering(String),

    /// An input file violated its contract (unparseable pixel key, missing
    /// bounds element, truncated document, ...).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("I/O error accessing '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("XML error in '{path}': {message}")]
    Xml { path: PathBuf, message: String },

    /// Encoding or decoding failure of the persisted spatial index pair.
    #[error("spatial index codec error: {0}")]
    IndexCodec(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json {
            path: path.into(),
            source,
        }
    }

    pub fn xml(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Xml {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
