//! Burns indexed label geometry onto the grid of downloaded scenes.
//!
//! Each matched scene gets a single-band i32 raster with identical width,
//! height, CRS, and affine transform, written alongside the imagery as
//! `{stem}_labels.tif`. Background encoding is configurable: 0 by default,
//! or -1 (tagged as no-data) when class 0 is a real label value.

pub mod burn;
pub mod error;
pub mod rasterize;

pub use burn::burn_geometry;
pub use error::{RasterizerError, RasterizerResult};
pub use rasterize::{
    label_output_path, labels_for_scene, rasterize_batch, rasterize_file, rasterize_scene,
    RasterizeOptions, RasterizedLabel, ScenePairing,
};
