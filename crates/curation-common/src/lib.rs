//! Common types and utilities shared across the EO curation pipeline.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod grid;
pub mod time;

pub use bbox::BoundingBox;
pub use crs::Crs;
pub use error::{CurationError, CurationResult};
pub use grid::{GridTransform, RasterGrid};
pub use time::{DateAllowance, QueryWindow};
