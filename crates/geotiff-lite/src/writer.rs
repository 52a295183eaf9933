//! GeoTIFF encoding.
//!
//! File layout: 8-byte header, band strips, auxiliary tag values, then a
//! single IFD at the end. Everything is little-endian and uncompressed.

use std::path::Path;

use curation_common::Crs;

use crate::error::{GeoTiffError, GeoTiffResult};
use crate::tags::*;
use crate::{GeoTiffImage, SampleBuffer};

/// Encode an image into an in-memory GeoTIFF.
pub fn encode(image: &GeoTiffImage) -> GeoTiffResult<Vec<u8>> {
    // Re-run the structural checks so hand-built images fail here too.
    let expected = image.width * image.height * image.bands;
    if image.samples.len() != expected || expected == 0 {
        return Err(GeoTiffError::InvalidImage(format!(
            "sample count {} does not match {} bands of {}x{}",
            image.samples.len(),
            image.bands,
            image.width,
            image.height
        )));
    }

    let plane_bytes = image.width * image.height * 4;
    let data_start: usize = 8;
    let aux_start = data_start + image.bands * plane_bytes;

    // Band strips.
    let mut strips = Vec::with_capacity(image.bands * plane_bytes);
    match &image.samples {
        SampleBuffer::F32(v) => {
            for s in v {
                strips.extend_from_slice(&s.to_le_bytes());
            }
        }
        SampleBuffer::I32(v) => {
            for s in v {
                strips.extend_from_slice(&s.to_le_bytes());
            }
        }
    }

    // Auxiliary region holds every tag value that does not fit inline.
    let mut aux = AuxRegion::new(aux_start);

    let strip_offsets: Vec<u32> = (0..image.bands)
        .map(|b| (data_start + b * plane_bytes) as u32)
        .collect();
    let strip_counts: Vec<u32> = vec![plane_bytes as u32; image.bands];

    let t = &image.transform;
    let pixel_scale = [t.pixel_width, t.pixel_height, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0];
    let geo_keys = build_geo_keys(&image.crs);

    let sample_format = match image.samples {
        SampleBuffer::F32(_) => SAMPLE_FORMAT_IEEE_FP,
        SampleBuffer::I32(_) => SAMPLE_FORMAT_INT,
    };

    // Entries must be sorted by tag number.
    let mut entries: Vec<IfdEntry> = Vec::new();
    entries.push(IfdEntry::long(IMAGE_WIDTH, image.width as u32));
    entries.push(IfdEntry::long(IMAGE_LENGTH, image.height as u32));
    entries.push(IfdEntry::shorts(
        BITS_PER_SAMPLE,
        &vec![32u16; image.bands],
        &mut aux,
    ));
    entries.push(IfdEntry::short(COMPRESSION, 1));
    entries.push(IfdEntry::short(PHOTOMETRIC, 1));
    entries.push(IfdEntry::longs(STRIP_OFFSETS, &strip_offsets, &mut aux));
    entries.push(IfdEntry::short(SAMPLES_PER_PIXEL, image.bands as u16));
    entries.push(IfdEntry::long(ROWS_PER_STRIP, image.height as u32));
    entries.push(IfdEntry::longs(STRIP_BYTE_COUNTS, &strip_counts, &mut aux));
    entries.push(IfdEntry::short(PLANAR_CONFIG, 2));
    entries.push(IfdEntry::shorts(
        SAMPLE_FORMAT,
        &vec![sample_format; image.bands],
        &mut aux,
    ));
    entries.push(IfdEntry::doubles(MODEL_PIXEL_SCALE, &pixel_scale, &mut aux));
    entries.push(IfdEntry::doubles(MODEL_TIEPOINT, &tiepoint, &mut aux));
    entries.push(IfdEntry::shorts(GEO_KEY_DIRECTORY, &geo_keys, &mut aux));
    if let Some(no_data) = image.no_data {
        entries.push(IfdEntry::ascii(GDAL_NODATA, &format_no_data(no_data), &mut aux));
    }

    let ifd_offset = aux_start + aux.bytes.len();

    let mut out = Vec::with_capacity(ifd_offset + 6 + entries.len() * 12);
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&(ifd_offset as u32).to_le_bytes());
    out.extend_from_slice(&strips);
    out.extend_from_slice(&aux.bytes);

    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for entry in &entries {
        entry.write(&mut out);
    }
    out.extend_from_slice(&0u32.to_le_bytes());

    Ok(out)
}

/// Encode an image and write it to `path` in one go. Callers that need
/// atomic placement write to a temp path and rename.
pub fn write_file(path: &Path, image: &GeoTiffImage) -> GeoTiffResult<()> {
    let bytes = encode(image)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// GDAL writes nodata as a plain decimal string; integral values get no
/// fractional part so re-reads compare exactly.
fn format_no_data(no_data: f64) -> String {
    if no_data.fract() == 0.0 && no_data.abs() < 1e15 {
        format!("{}", no_data as i64)
    } else {
        format!("{}", no_data)
    }
}

fn build_geo_keys(crs: &Crs) -> Vec<u16> {
    let (model_type, cs_key, epsg) = if crs.is_geographic() {
        (MODEL_TYPE_GEOGRAPHIC, KEY_GEOGRAPHIC_TYPE, crs.epsg() as u16)
    } else {
        (MODEL_TYPE_PROJECTED, KEY_PROJECTED_CS_TYPE, crs.epsg() as u16)
    };
    vec![
        // KeyDirectoryVersion, KeyRevision, MinorRevision, NumberOfKeys
        1, 1, 0, 3,
        KEY_GT_MODEL_TYPE, 0, 1, model_type,
        KEY_GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA,
        cs_key, 0, 1, epsg,
    ]
}

/// Out-of-line tag value storage appended between the strips and the IFD.
struct AuxRegion {
    base: usize,
    bytes: Vec<u8>,
}

impl AuxRegion {
    fn new(base: usize) -> Self {
        AuxRegion {
            base,
            bytes: Vec::new(),
        }
    }

    /// Append a value blob and return its absolute file offset. Offsets are
    /// kept even as TIFF requires.
    fn push(&mut self, value: &[u8]) -> u32 {
        if self.bytes.len() % 2 != 0 {
            self.bytes.push(0);
        }
        let offset = self.base + self.bytes.len();
        self.bytes.extend_from_slice(value);
        offset as u32
    }
}

struct IfdEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    value: u32,
}

impl IfdEntry {
    fn short(tag: u16, value: u16) -> Self {
        IfdEntry {
            tag,
            field_type: TYPE_SHORT,
            count: 1,
            value: value as u32,
        }
    }

    fn long(tag: u16, value: u32) -> Self {
        IfdEntry {
            tag,
            field_type: TYPE_LONG,
            count: 1,
            value,
        }
    }

    fn shorts(tag: u16, values: &[u16], aux: &mut AuxRegion) -> Self {
        let value = match values {
            [a] => *a as u32,
            [a, b] => *a as u32 | (*b as u32) << 16,
            _ => {
                let mut bytes = Vec::with_capacity(values.len() * 2);
                for v in values {
                    bytes.extend_from_slice(&v.to_le_bytes());
                }
                aux.push(&bytes)
            }
        };
        IfdEntry {
            tag,
            field_type: TYPE_SHORT,
            count: values.len() as u32,
            value,
        }
    }

    fn longs(tag: u16, values: &[u32], aux: &mut AuxRegion) -> Self {
        let value = match values {
            [a] => *a,
            _ => {
                let mut bytes = Vec::with_capacity(values.len() * 4);
                for v in values {
                    bytes.extend_from_slice(&v.to_le_bytes());
                }
                aux.push(&bytes)
            }
        };
        IfdEntry {
            tag,
            field_type: TYPE_LONG,
            count: values.len() as u32,
            value,
        }
    }

    fn doubles(tag: u16, values: &[f64], aux: &mut AuxRegion) -> Self {
        let mut bytes = Vec::with_capacity(values.len() * 8);
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        IfdEntry {
            tag,
            field_type: TYPE_DOUBLE,
            count: values.len() as u32,
            value: aux.push(&bytes),
        }
    }

    fn ascii(tag: u16, value: &str, aux: &mut AuxRegion) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        let count = bytes.len() as u32;
        let value = if bytes.len() <= 4 {
            let mut packed = [0u8; 4];
            packed[..bytes.len()].copy_from_slice(&bytes);
            u32::from_le_bytes(packed)
        } else {
            aux.push(&bytes)
        };
        IfdEntry {
            tag,
            field_type: TYPE_ASCII,
            count,
            value,
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.tag.to_le_bytes());
        out.extend_from_slice(&self.field_type.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&self.value.to_le_bytes());
    }
}
