//! GeoTIFF decoding for the subset produced by [`crate::writer`].

use std::collections::HashMap;
use std::path::Path;

use curation_common::{Crs, GridTransform};

use crate::error::{GeoTiffError, GeoTiffResult};
use crate::tags::*;
use crate::{GeoTiffImage, SampleBuffer};

/// Decode a GeoTIFF from memory.
pub fn decode(bytes: &[u8]) -> GeoTiffResult<GeoTiffImage> {
    let cursor = Cursor::new(bytes);
    if cursor.remaining(0) < 8 {
        return Err(GeoTiffError::NotTiff("file shorter than header".into()));
    }
    match &bytes[0..4] {
        [b'I', b'I', 42, 0] => {}
        [b'M', b'M', _, _] => {
            return Err(GeoTiffError::Unsupported("big-endian byte order".into()))
        }
        _ => return Err(GeoTiffError::NotTiff("bad magic".into())),
    }

    let ifd_offset = cursor.u32(4)? as usize;
    let entries = read_ifd(&cursor, ifd_offset)?;

    let width = require_scalar(&entries, IMAGE_WIDTH, "ImageWidth")? as usize;
    let height = require_scalar(&entries, IMAGE_LENGTH, "ImageLength")? as usize;
    let bands = entries
        .get(&SAMPLES_PER_PIXEL)
        .map(|e| e.value)
        .unwrap_or(1) as usize;
    if width == 0 || height == 0 || bands == 0 {
        return Err(GeoTiffError::InvalidImage(format!(
            "zero dimension: {} bands of {}x{}",
            bands, width, height
        )));
    }

    let compression = entries.get(&COMPRESSION).map(|e| e.value).unwrap_or(1);
    if compression != 1 {
        return Err(GeoTiffError::Unsupported(format!(
            "compression {}",
            compression
        )));
    }
    let planar = entries.get(&PLANAR_CONFIG).map(|e| e.value).unwrap_or(1);
    if planar != 2 && bands > 1 {
        return Err(GeoTiffError::Unsupported(format!(
            "planar configuration {}",
            planar
        )));
    }

    let bits = entries
        .get(&BITS_PER_SAMPLE)
        .map(|e| cursor.short_values(e))
        .transpose()?
        .unwrap_or_else(|| vec![1]);
    if bits.iter().any(|b| *b != 32) {
        return Err(GeoTiffError::Unsupported(format!(
            "bits per sample {:?}",
            bits
        )));
    }

    let formats = entries
        .get(&SAMPLE_FORMAT)
        .map(|e| cursor.short_values(e))
        .transpose()?
        .unwrap_or_else(|| vec![SAMPLE_FORMAT_IEEE_FP]);
    let format = *formats.first().unwrap_or(&SAMPLE_FORMAT_IEEE_FP);
    if formats.iter().any(|f| *f != format) {
        return Err(GeoTiffError::Unsupported("mixed sample formats".into()));
    }
    if format != SAMPLE_FORMAT_IEEE_FP && format != SAMPLE_FORMAT_INT {
        return Err(GeoTiffError::Unsupported(format!("sample format {}", format)));
    }

    let strip_offsets = entries
        .get(&STRIP_OFFSETS)
        .map(|e| cursor.long_values(e))
        .transpose()?
        .ok_or(GeoTiffError::MissingTag("StripOffsets"))?;
    let strip_counts = entries
        .get(&STRIP_BYTE_COUNTS)
        .map(|e| cursor.long_values(e))
        .transpose()?
        .ok_or(GeoTiffError::MissingTag("StripByteCounts"))?;
    if strip_offsets.len() != bands || strip_counts.len() != bands {
        return Err(GeoTiffError::Unsupported(format!(
            "expected one strip per band, got {} strips for {} bands",
            strip_offsets.len(),
            bands
        )));
    }

    let plane_bytes = width * height * 4;
    let mut raw = Vec::with_capacity(bands * plane_bytes);
    for (offset, count) in strip_offsets.iter().zip(&strip_counts) {
        if *count as usize != plane_bytes {
            return Err(GeoTiffError::Unsupported(format!(
                "strip byte count {} does not match plane size {}",
                count, plane_bytes
            )));
        }
        raw.extend_from_slice(cursor.slice(*offset as usize, plane_bytes)?);
    }

    let samples = match format {
        SAMPLE_FORMAT_IEEE_FP => SampleBuffer::F32(
            raw.chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        _ => SampleBuffer::I32(
            raw.chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
    };

    let transform = read_transform(&cursor, &entries)?;
    let crs = read_crs(&cursor, &entries)?;
    let no_data = read_no_data(&cursor, &entries)?;

    GeoTiffImage::new(width, height, bands, crs, transform, no_data, samples)
}

/// Read and decode a GeoTIFF file.
pub fn read_file(path: &Path) -> GeoTiffResult<GeoTiffImage> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

fn read_ifd(cursor: &Cursor<'_>, offset: usize) -> GeoTiffResult<HashMap<u16, RawEntry>> {
    let count = cursor.u16(offset)? as usize;
    let mut entries = HashMap::with_capacity(count);
    for i in 0..count {
        let base = offset + 2 + i * 12;
        entries.insert(
            cursor.u16(base)?,
            RawEntry {
                field_type: cursor.u16(base + 2)?,
                count: cursor.u32(base + 4)?,
                value: cursor.u32(base + 8)?,
                value_offset: base + 8,
            },
        );
    }
    Ok(entries)
}

fn require_scalar(
    entries: &HashMap<u16, RawEntry>,
    tag: u16,
    name: &'static str,
) -> GeoTiffResult<u32> {
    entries
        .get(&tag)
        .map(|e| e.value)
        .ok_or(GeoTiffError::MissingTag(name))
}

fn read_transform(
    cursor: &Cursor<'_>,
    entries: &HashMap<u16, RawEntry>,
) -> GeoTiffResult<GridTransform> {
    let scale = entries
        .get(&MODEL_PIXEL_SCALE)
        .map(|e| cursor.double_values(e))
        .transpose()?
        .ok_or(GeoTiffError::MissingTag("ModelPixelScale"))?;
    let tie = entries
        .get(&MODEL_TIEPOINT)
        .map(|e| cursor.double_values(e))
        .transpose()?
        .ok_or(GeoTiffError::MissingTag("ModelTiepoint"))?;
    if scale.len() < 2 || tie.len() < 6 {
        return Err(GeoTiffError::MalformedTag {
            tag: MODEL_TIEPOINT,
            reason: "georeferencing tags too short".into(),
        });
    }
    // Only raster-origin tiepoints are produced by the writer.
    if tie[0] != 0.0 || tie[1] != 0.0 {
        return Err(GeoTiffError::Unsupported("non-origin tiepoint".into()));
    }
    Ok(GridTransform::new(tie[3], tie[4], scale[0], scale[1]))
}

fn read_crs(cursor: &Cursor<'_>, entries: &HashMap<u16, RawEntry>) -> GeoTiffResult<Crs> {
    let keys = entries
        .get(&GEO_KEY_DIRECTORY)
        .map(|e| cursor.short_values(e))
        .transpose()?
        .ok_or(GeoTiffError::MissingTag("GeoKeyDirectory"))?;
    if keys.len() < 4 || keys.len() % 4 != 0 {
        return Err(GeoTiffError::MalformedTag {
            tag: GEO_KEY_DIRECTORY,
            reason: format!("length {} is not a multiple of 4", keys.len()),
        });
    }
    // Key entries follow the 4-short header; EPSG-coded keys carry their
    // value inline (location 0).
    for entry in keys[4..].chunks_exact(4) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location == 0 && (key == KEY_GEOGRAPHIC_TYPE || key == KEY_PROJECTED_CS_TYPE) {
            return Ok(Crs::from_epsg(value as u32)?);
        }
    }
    Err(GeoTiffError::MalformedTag {
        tag: GEO_KEY_DIRECTORY,
        reason: "no geographic or projected CS key".into(),
    })
}

fn read_no_data(
    cursor: &Cursor<'_>,
    entries: &HashMap<u16, RawEntry>,
) -> GeoTiffResult<Option<f64>> {
    let entry = match entries.get(&GDAL_NODATA) {
        Some(e) => e,
        None => return Ok(None),
    };
    let text = cursor.ascii_value(entry)?;
    let value = text
        .trim()
        .parse::<f64>()
        .map_err(|_| GeoTiffError::MalformedTag {
            tag: GDAL_NODATA,
            reason: format!("not a number: {:?}", text),
        })?;
    Ok(Some(value))
}

struct RawEntry {
    field_type: u16,
    count: u32,
    value: u32,
    /// Absolute offset of the 4-byte value field, for inline multi-values.
    value_offset: usize,
}

struct Cursor<'a> {
    bytes: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes }
    }

    fn remaining(&self, offset: usize) -> usize {
        self.bytes.len().saturating_sub(offset)
    }

    fn slice(&self, offset: usize, len: usize) -> GeoTiffResult<&'a [u8]> {
        if self.remaining(offset) < len {
            return Err(GeoTiffError::Truncated {
                needed: len,
                offset,
                available: self.remaining(offset),
            });
        }
        Ok(&self.bytes[offset..offset + len])
    }

    fn u16(&self, offset: usize) -> GeoTiffResult<u16> {
        let b = self.slice(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&self, offset: usize) -> GeoTiffResult<u32> {
        let b = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Where an entry's values live: inline when they fit in 4 bytes,
    /// otherwise at the offset stored in the value field.
    fn value_region(&self, entry: &RawEntry, elem_size: usize) -> GeoTiffResult<usize> {
        let total = entry.count as usize * elem_size;
        if total <= 4 {
            Ok(entry.value_offset)
        } else {
            Ok(entry.value as usize)
        }
    }

    fn short_values(&self, entry: &RawEntry) -> GeoTiffResult<Vec<u16>> {
        if entry.field_type != TYPE_SHORT {
            return Err(GeoTiffError::MalformedTag {
                tag: 0,
                reason: format!("expected SHORT, got type {}", entry.field_type),
            });
        }
        let start = self.value_region(entry, 2)?;
        let raw = self.slice(start, entry.count as usize * 2)?;
        Ok(raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect())
    }

    fn long_values(&self, entry: &RawEntry) -> GeoTiffResult<Vec<u32>> {
        match entry.field_type {
            TYPE_LONG => {
                let start = self.value_region(entry, 4)?;
                let raw = self.slice(start, entry.count as usize * 4)?;
                Ok(raw
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect())
            }
            // SHORT-typed strip tags appear in files from other writers.
            TYPE_SHORT => Ok(self
                .short_values(entry)?
                .into_iter()
                .map(u32::from)
                .collect()),
            other => Err(GeoTiffError::MalformedTag {
                tag: 0,
                reason: format!("expected LONG, got type {}", other),
            }),
        }
    }

    fn double_values(&self, entry: &RawEntry) -> GeoTiffResult<Vec<f64>> {
        if entry.field_type != TYPE_DOUBLE {
            return Err(GeoTiffError::MalformedTag {
                tag: 0,
                reason: format!("expected DOUBLE, got type {}", entry.field_type),
            });
        }
        let raw = self.slice(entry.value as usize, entry.count as usize * 8)?;
        Ok(raw
            .chunks_exact(8)
            .map(|c| {
                f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
            })
            .collect())
    }

    fn ascii_value(&self, entry: &RawEntry) -> GeoTiffResult<String> {
        let start = self.value_region(entry, 1)?;
        let raw = self.slice(start, entry.count as usize)?;
        let text = raw.split(|b| *b == 0).next().unwrap_or(&[]);
        Ok(String::from_utf8_lossy(text).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer;
    use curation_common::GridTransform;

    fn sample_transform() -> GridTransform {
        GridTransform::new(-10.0, 52.0, 0.01, 0.01)
    }

    #[test]
    fn test_f32_roundtrip_multiband() {
        let samples: Vec<f32> = (0..3 * 4 * 5).map(|i| i as f32 * 0.5).collect();
        let image = GeoTiffImage::new(
            4,
            5,
            3,
            Crs::Epsg4326,
            sample_transform(),
            None,
            SampleBuffer::F32(samples),
        )
        .unwrap();

        let bytes = writer::encode(&image).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_i32_roundtrip_with_nodata() {
        let samples: Vec<i32> = vec![-1, 0, 1, 2, 1, -1];
        let image = GeoTiffImage::new(
            3,
            2,
            1,
            Crs::Utm {
                zone: 33,
                north: true,
            },
            sample_transform(),
            Some(-1.0),
            SampleBuffer::I32(samples),
        )
        .unwrap();

        let bytes = writer::encode(&image).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.no_data, Some(-1.0));
        assert_eq!(decoded.crs.epsg(), 32633);
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let image = GeoTiffImage::new(
            2,
            2,
            1,
            Crs::Epsg4326,
            sample_transform(),
            Some(0.0),
            SampleBuffer::F32(vec![1.0, 2.0, 3.0, 4.0]),
        )
        .unwrap();
        assert_eq!(writer::encode(&image).unwrap(), writer::encode(&image).unwrap());
    }

    #[test]
    fn test_rejects_non_tiff() {
        assert!(matches!(
            decode(b"not a tiff at all"),
            Err(GeoTiffError::NotTiff(_))
        ));
        assert!(decode(b"II").is_err());
    }

    #[test]
    fn test_rejects_big_endian() {
        let mut bytes = vec![b'M', b'M', 0, 42];
        bytes.extend_from_slice(&[0, 0, 0, 8]);
        assert!(matches!(
            decode(&bytes),
            Err(GeoTiffError::Unsupported(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_file() {
        let image = GeoTiffImage::new(
            8,
            8,
            1,
            Crs::Epsg4326,
            sample_transform(),
            None,
            SampleBuffer::F32(vec![0.0; 64]),
        )
        .unwrap();
        let bytes = writer::encode(&image).unwrap();
        assert!(decode(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.tif");
        let image = GeoTiffImage::new(
            2,
            3,
            1,
            Crs::Epsg4326,
            sample_transform(),
            Some(-1.0),
            SampleBuffer::I32(vec![1, 1, -1, -1, 2, 2]),
        )
        .unwrap();

        writer::write_file(&path, &image).unwrap();
        let decoded = read_file(&path).unwrap();
        assert_eq!(decoded, image);
    }
}
