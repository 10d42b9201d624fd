#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::let_and_return,
    clippy::cmp_owned
)]

pub mod clustering;
pub mod error;
pub mod formats;
pub mod geocode;
pub mod geometry;
pub mod naming;
pub mod osm;
pub mod pipeline;
pub mod roadgraph;
pub mod spatial;

pub use error::{Error, Result};
