//! Per-frame header decoding.
//!
//! Every frame in a data file starts with a comma-separated ASCII parameter
//! list followed by fields this decoder does not interpret and padding. The
//! header length is itself the third field, so decoding reads a fixed-size
//! prefix first and then the full header from the same start position.
//!
//! Field order of the interpreted part:
//!
//! | # | field                          | stored as                |
//! |---|--------------------------------|--------------------------|
//! | 1 | header id                      | `header_id`              |
//! | 2 | acquisition sequence (1-based) | `sequence` (0-based)     |
//! | 3 | header length in bytes         | `header_bytes`           |
//! | 4 | number of chips                | `chips`                  |
//! | 5 | pixel columns                  | `columns`                |
//! | 6 | pixel rows                     | `rows`                   |
//! | 7 | pixel depth, e.g. `U16`        | `bits_per_pixel`         |
//! | 8 | sensor layout                  | `sensor_layout`          |
//! | 9 | chip select (hex)              | `chip_select`            |
//! |10 | timestamp                      | `timestamp`              |
//! |11 | shutter open time (s)          | `dwell_time`             |

use std::io::{Read, Seek, SeekFrom};

use crate::consts::{FRAME_HEADER_PREFIX_BYTES, FRAME_HEADER_SIZE_MAX};
use crate::error::{MerlinError, Result};
use crate::frame::{FrameGeometry, PixelDepth};
use crate::io::fields::{c_text, leading_float, leading_hex, leading_int, next_token};

/// Decoded frame header. The first header of an acquisition serves as the
/// expected layout of every other frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameHeaderTemplate {
    /// Header size in bytes.
    pub header_bytes: usize,
    pub columns: usize,
    pub rows: usize,
    /// Zero-based acquisition sequence index.
    pub sequence: i64,
    pub chips: u8,
    pub bits_per_pixel: u8,
    /// Chip selection bits, least significant bit is the first chip.
    pub chip_select: u32,
    /// Frame dwell time in seconds.
    pub dwell_time: f64,
    pub sensor_layout: String,
    pub header_id: String,
    pub timestamp: String,
}

impl FrameHeaderTemplate {
    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.columns, self.rows)
    }

    pub fn pixel_depth(&self) -> Result<PixelDepth> {
        PixelDepth::try_from(self.bits_per_pixel)
    }

    /// Pixel payload size in bytes.
    pub fn data_bytes(&self) -> usize {
        (self.columns * self.rows * self.bits_per_pixel as usize) >> 3
    }

    /// Describe the first layout difference to `other`, if any.
    ///
    /// Only the values that determine header and payload sizes are compared.
    pub fn layout_mismatch(&self, other: &FrameHeaderTemplate) -> Option<String> {
        if self.header_bytes != other.header_bytes {
            return Some(format!(
                "header size {} != {}",
                other.header_bytes, self.header_bytes
            ));
        }
        if self.bits_per_pixel != other.bits_per_pixel {
            return Some(format!(
                "bits per pixel {} != {}",
                other.bits_per_pixel, self.bits_per_pixel
            ));
        }
        if self.columns != other.columns {
            return Some(format!("columns {} != {}", other.columns, self.columns));
        }
        if self.rows != other.rows {
            return Some(format!("rows {} != {}", other.rows, self.rows));
        }
        None
    }
}

/// Sequential field reader over a header buffer.
struct FieldCursor<'a> {
    text: &'a [u8],
    pos: usize,
    limit: usize,
}

impl<'a> FieldCursor<'a> {
    fn new(buf: &'a [u8], pos: usize) -> Self {
        let text = c_text(buf);
        Self {
            text,
            pos,
            limit: text.len(),
        }
    }

    fn next(&mut self, field: &'static str) -> Result<String> {
        let token = next_token(self.text, self.pos);
        if token.next >= self.limit {
            return Err(MerlinError::TruncatedHeader { field });
        }
        self.pos = token.next;
        Ok(token.value)
    }
}

/// Decode the frame header at the current stream position.
///
/// On return the stream is positioned at `start + header_bytes`, i.e. at the
/// first byte of the pixel payload. A stream that ends before a complete
/// header yields [`MerlinError::UnexpectedEof`].
pub fn decode_frame_header<R: Read + Seek>(reader: &mut R) -> Result<FrameHeaderTemplate> {
    let start = reader.stream_position()?;

    let mut prefix = [0u8; FRAME_HEADER_PREFIX_BYTES];
    read_block(reader, &mut prefix, start)?;

    let mut header = FrameHeaderTemplate::default();
    let mut cursor = FieldCursor::new(&prefix, 0);
    header.header_id = cursor.next("header id")?;
    header.sequence = leading_int(&cursor.next("sequence number")?) - 1;
    let declared = leading_int(&cursor.next("header length")?);
    let resume = cursor.pos;

    if declared <= 0 || declared > FRAME_HEADER_SIZE_MAX as i64 {
        return Err(MerlinError::UnsupportedHeaderSize(declared));
    }
    let header_bytes = declared as usize;
    header.header_bytes = header_bytes;

    reader
        .seek(SeekFrom::Start(start))
        .map_err(|_| MerlinError::RepositionFailed { offset: start })?;
    let mut full = vec![0u8; header_bytes];
    read_block(reader, &mut full, start)?;

    let parsed = parse_body(&mut header, FieldCursor::new(&full, resume));

    let end = start + header_bytes as u64;
    match reader.seek(SeekFrom::Start(end)) {
        Ok(pos) if pos == end => {}
        _ => return Err(MerlinError::RepositionFailed { offset: end }),
    }

    parsed.map(|_| header)
}

fn parse_body(header: &mut FrameHeaderTemplate, mut cursor: FieldCursor<'_>) -> Result<()> {
    header.chips = leading_int(&cursor.next("chip count")?).clamp(0, u8::MAX as i64) as u8;
    header.columns = leading_int(&cursor.next("pixel columns")?).max(0) as usize;
    header.rows = leading_int(&cursor.next("pixel rows")?).max(0) as usize;
    header.bits_per_pixel = depth_bits(&cursor.next("pixel depth")?);
    header.sensor_layout = cursor.next("sensor layout")?;
    header.chip_select = leading_hex(&cursor.next("chip select")?);
    header.timestamp = cursor.next("timestamp")?;
    header.dwell_time = leading_float(&cursor.next("dwell time")?);
    Ok(())
}

/// Bits per pixel from a depth descriptor such as `U08`, `U16` or `U32`.
fn depth_bits(descriptor: &str) -> u8 {
    let digits: String = descriptor.chars().skip(1).take(2).collect();
    leading_int(&digits).clamp(0, u8::MAX as i64) as u8
}

fn read_block<R: Read>(reader: &mut R, buf: &mut [u8], offset: u64) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => MerlinError::UnexpectedEof { offset },
        _ => MerlinError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_bits() {
        assert_eq!(depth_bits("U08"), 8);
        assert_eq!(depth_bits("U16"), 16);
        assert_eq!(depth_bits("U32"), 32);
        assert_eq!(depth_bits("U1"), 1);
        assert_eq!(depth_bits(""), 0);
    }

    #[test]
    fn test_layout_mismatch_reports_columns() {
        let a = FrameHeaderTemplate {
            header_bytes: 384,
            columns: 256,
            rows: 256,
            bits_per_pixel: 16,
            ..Default::default()
        };
        let b = FrameHeaderTemplate {
            columns: 128,
            ..a.clone()
        };
        assert!(a.layout_mismatch(&a).is_none());
        let detail = a.layout_mismatch(&b).unwrap();
        assert!(detail.contains("columns"));
    }
}
