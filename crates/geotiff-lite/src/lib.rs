//! Minimal GeoTIFF reader/writer for curated raster outputs.
//!
//! This crate implements exactly the subset of TIFF 6.0 + GeoTIFF 1.1 the
//! curation pipeline produces and consumes:
//!
//! - little-endian, uncompressed, 32-bit samples (IEEE float or signed int)
//! - planar configuration 2 with one strip per band
//! - georeferencing via ModelPixelScale + ModelTiepoint and a GeoKey
//!   directory carrying the EPSG code
//! - optional GDAL_NODATA ASCII tag
//!
//! Anything outside that subset is rejected with a descriptive error rather
//! than guessed at.

pub mod error;
pub mod reader;
pub mod writer;

/// TIFF tag and type codes used by the subset.
pub(crate) mod tags {
    pub const IMAGE_WIDTH: u16 = 256;
    pub const IMAGE_LENGTH: u16 = 257;
    pub const BITS_PER_SAMPLE: u16 = 258;
    pub const COMPRESSION: u16 = 259;
    pub const PHOTOMETRIC: u16 = 262;
    pub const STRIP_OFFSETS: u16 = 273;
    pub const SAMPLES_PER_PIXEL: u16 = 277;
    pub const ROWS_PER_STRIP: u16 = 278;
    pub const STRIP_BYTE_COUNTS: u16 = 279;
    pub const PLANAR_CONFIG: u16 = 284;
    pub const SAMPLE_FORMAT: u16 = 339;
    pub const MODEL_PIXEL_SCALE: u16 = 33550;
    pub const MODEL_TIEPOINT: u16 = 33922;
    pub const GEO_KEY_DIRECTORY: u16 = 34735;
    pub const GDAL_NODATA: u16 = 42113;

    pub const TYPE_ASCII: u16 = 2;
    pub const TYPE_SHORT: u16 = 3;
    pub const TYPE_LONG: u16 = 4;
    pub const TYPE_DOUBLE: u16 = 12;

    pub const SAMPLE_FORMAT_INT: u16 = 2;
    pub const SAMPLE_FORMAT_IEEE_FP: u16 = 3;

    pub const KEY_GT_MODEL_TYPE: u16 = 1024;
    pub const KEY_GT_RASTER_TYPE: u16 = 1025;
    pub const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
    pub const KEY_PROJECTED_CS_TYPE: u16 = 3072;

    pub const MODEL_TYPE_PROJECTED: u16 = 1;
    pub const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
    pub const RASTER_PIXEL_IS_AREA: u16 = 1;
}

pub use error::{GeoTiffError, GeoTiffResult};
pub use reader::{decode, read_file};
pub use writer::{encode, write_file};

use curation_common::{Crs, GridTransform};

/// Sample payload of a decoded or to-be-encoded image. All bands share one
/// type; planes are stored band-major, row-major within each band.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    F32(Vec<f32>),
    I32(Vec<i32>),
}

impl SampleBuffer {
    pub fn len(&self) -> usize {
        match self {
            SampleBuffer::F32(v) => v.len(),
            SampleBuffer::I32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A georeferenced multi-band image.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoTiffImage {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub crs: Crs,
    pub transform: GridTransform,
    pub no_data: Option<f64>,
    pub samples: SampleBuffer,
}

impl GeoTiffImage {
    pub fn new(
        width: usize,
        height: usize,
        bands: usize,
        crs: Crs,
        transform: GridTransform,
        no_data: Option<f64>,
        samples: SampleBuffer,
    ) -> GeoTiffResult<Self> {
        if width == 0 || height == 0 || bands == 0 {
            return Err(GeoTiffError::InvalidImage(format!(
                "dimensions must be non-zero, got {} bands of {}x{}",
                bands, width, height
            )));
        }
        let expected = width * height * bands;
        if samples.len() != expected {
            return Err(GeoTiffError::InvalidImage(format!(
                "sample count {} does not match {} bands of {}x{}",
                samples.len(),
                bands,
                width,
                height
            )));
        }
        Ok(GeoTiffImage {
            width,
            height,
            bands,
            crs,
            transform,
            no_data,
            samples,
        })
    }
}
