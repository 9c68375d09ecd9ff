//! Raw pixel payload to `f64` transcoding.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{ByteOrder, NativeEndian};
use ndarray::Array2;
use num_traits::{AsPrimitive, PrimInt};

use crate::error::{MerlinError, Result};
use crate::frame::{FrameGeometry, PixelDepth};

/// Unsigned integer type stored in a frame payload.
trait RawPixel: PrimInt + AsPrimitive<f64> {
    const BYTES: usize;

    fn read_native(bytes: &[u8]) -> Self;
}

impl RawPixel for u8 {
    const BYTES: usize = 1;

    fn read_native(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl RawPixel for u16 {
    const BYTES: usize = 2;

    fn read_native(bytes: &[u8]) -> Self {
        NativeEndian::read_u16(bytes)
    }
}

impl RawPixel for u32 {
    const BYTES: usize = 4;

    fn read_native(bytes: &[u8]) -> Self {
        NativeEndian::read_u32(bytes)
    }
}

fn widen<T: RawPixel>(raw: &[u8], count: usize, swap_bytes: bool) -> Vec<f64> {
    raw.chunks_exact(T::BYTES)
        .take(count)
        .map(|chunk| {
            let value = T::read_native(chunk);
            let value = if swap_bytes { value.swap_bytes() } else { value };
            value.as_()
        })
        .collect()
}

/// Decode a raw payload into a `(rows, columns)` array of doubles.
///
/// Values are read in host byte order; `swap_bytes` reverses the bytes of
/// each multi-byte value first (big-endian data on a little-endian host).
pub fn decode_pixels(
    raw: &[u8],
    geometry: FrameGeometry,
    depth: PixelDepth,
    swap_bytes: bool,
) -> Result<Array2<f64>> {
    let count = geometry.pixel_count();
    let needed = count * depth.bytes();
    if raw.len() < needed {
        return Err(MerlinError::ShapeMismatch {
            expected: needed,
            actual: raw.len(),
        });
    }

    let values = match depth {
        PixelDepth::U8 => widen::<u8>(raw, count, swap_bytes),
        PixelDepth::U16 => widen::<u16>(raw, count, swap_bytes),
        PixelDepth::U32 => widen::<u32>(raw, count, swap_bytes),
    };

    Array2::from_shape_vec(geometry.shape(), values)
        .map_err(|e| MerlinError::InvalidGeometry(e.to_string()))
}

/// Read `data_bytes` raw bytes at `offset`.
pub fn read_raw<R: Read + Seek>(reader: &mut R, offset: u64, data_bytes: usize) -> Result<Vec<u8>> {
    reader
        .seek(SeekFrom::Start(offset))
        .map_err(|_| MerlinError::RepositionFailed { offset })?;
    let mut raw = vec![0u8; data_bytes];
    reader.read_exact(&mut raw).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => MerlinError::UnexpectedEof { offset },
        _ => MerlinError::Io(e),
    })?;
    Ok(raw)
}

/// Read and decode the pixel payload at `offset`.
pub fn read_pixels<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    data_bytes: usize,
    geometry: FrameGeometry,
    depth: PixelDepth,
    swap_bytes: bool,
) -> Result<Array2<f64>> {
    let raw = read_raw(reader, offset, data_bytes)?;
    decode_pixels(&raw, geometry, depth, swap_bytes)
}
