mod common;

use std::io::{Cursor, Seek};

use approx::assert_relative_eq;

use common::{build_frame_header, build_frame_header_sized, HEADER_BYTES};
use merlin_core::error::{ErrorKind, MerlinError};
use merlin_core::frame::PixelDepth;
use merlin_core::io::frame_header::decode_frame_header;

#[test]
fn test_decode_u16_header() {
    let mut cursor = Cursor::new(build_frame_header(0, 256, 128, "U16"));
    let header = decode_frame_header(&mut cursor).unwrap();

    assert_eq!(header.header_id, "MQ1");
    assert_eq!(header.sequence, 0);
    assert_eq!(header.header_bytes, HEADER_BYTES);
    assert_eq!(header.chips, 1);
    assert_eq!(header.columns, 256);
    assert_eq!(header.rows, 128);
    assert_eq!(header.bits_per_pixel, 16);
    assert_eq!(header.pixel_depth().unwrap(), PixelDepth::U16);
    assert_eq!(header.sensor_layout, "   1x1");
    assert_eq!(header.chip_select, 1);
    assert_eq!(header.timestamp, "2020-11-23 10:27:41.123456");
    assert_relative_eq!(header.dwell_time, 0.001);
    assert_eq!(header.data_bytes(), 256 * 128 * 2);
}

#[test]
fn test_decode_positions_stream_at_payload() {
    let mut bytes = build_frame_header(41, 4, 4, "U08");
    bytes.extend_from_slice(&[7u8; 16]);
    let mut cursor = Cursor::new(bytes);

    let header = decode_frame_header(&mut cursor).unwrap();
    assert_eq!(header.sequence, 41);
    assert_eq!(header.bits_per_pixel, 8);
    assert_eq!(cursor.stream_position().unwrap(), HEADER_BYTES as u64);
}

#[test]
fn test_decode_at_nonzero_offset() {
    let first = build_frame_header(0, 2, 2, "U32");
    let mut bytes = first.clone();
    bytes.extend_from_slice(&[0u8; 16]);
    bytes.extend(build_frame_header(1, 2, 2, "U32"));
    let mut cursor = Cursor::new(bytes);

    decode_frame_header(&mut cursor).unwrap();
    cursor.seek(std::io::SeekFrom::Current(16)).unwrap();
    let second = decode_frame_header(&mut cursor).unwrap();
    assert_eq!(second.sequence, 1);
    assert_eq!(second.bits_per_pixel, 32);
    assert_eq!(cursor.stream_position().unwrap(), 2 * HEADER_BYTES as u64 + 16);
}

#[test]
fn test_oversized_header_rejected() {
    let mut cursor = Cursor::new(build_frame_header_sized(0, 4, 4, "U16", 3000));
    let err = decode_frame_header(&mut cursor).unwrap_err();
    assert!(matches!(err, MerlinError::UnsupportedHeaderSize(3000)));
    assert_eq!(err.kind(), ErrorKind::FormatError);
}

#[test]
fn test_zero_header_length_rejected() {
    let mut bytes = b"MQ1,000001,00000,01,0004,0004,U16".to_vec();
    bytes.resize(HEADER_BYTES, b' ');
    let err = decode_frame_header(&mut Cursor::new(bytes)).unwrap_err();
    assert!(matches!(err, MerlinError::UnsupportedHeaderSize(0)));
}

#[test]
fn test_short_stream_is_eof() {
    let bytes = build_frame_header(0, 4, 4, "U16");
    let err = decode_frame_header(&mut Cursor::new(bytes[..100].to_vec())).unwrap_err();
    assert!(matches!(err, MerlinError::UnexpectedEof { offset: 0 }));
    assert_eq!(err.kind(), ErrorKind::StreamFailure);
}

#[test]
fn test_stream_shorter_than_declared_header() {
    let bytes = build_frame_header(0, 4, 4, "U16");
    let err = decode_frame_header(&mut Cursor::new(bytes[..200].to_vec())).unwrap_err();
    assert!(matches!(err, MerlinError::UnexpectedEof { .. }));
}

#[test]
fn test_truncated_field_list() {
    let mut bytes = b"MQ1,000001,00384,01,0004".to_vec();
    bytes.resize(HEADER_BYTES, 0);
    let err = decode_frame_header(&mut Cursor::new(bytes)).unwrap_err();
    assert!(matches!(
        err,
        MerlinError::TruncatedHeader {
            field: "pixel columns"
        }
    ));
    assert_eq!(err.kind(), ErrorKind::FormatError);
}

#[test]
fn test_nul_padded_header() {
    let text = b"MQ1,000003,00384,01,0008,0002,U08,   1x1,01,2020-11-23 10:27:41.000000,0.000500,0,0";
    let mut bytes = text.to_vec();
    bytes.resize(HEADER_BYTES, 0);
    let header = decode_frame_header(&mut Cursor::new(bytes)).unwrap();
    assert_eq!(header.sequence, 2);
    assert_eq!(header.columns, 8);
    assert_eq!(header.rows, 2);
    assert_relative_eq!(header.dwell_time, 0.0005);
}

#[test]
fn test_unsupported_pixel_depth() {
    let mut cursor = Cursor::new(build_frame_header(0, 4, 4, "U12"));
    let header = decode_frame_header(&mut cursor).unwrap();
    assert_eq!(header.bits_per_pixel, 12);
    let err = header.pixel_depth().unwrap_err();
    assert!(matches!(err, MerlinError::UnsupportedPixelDepth(12)));
}
