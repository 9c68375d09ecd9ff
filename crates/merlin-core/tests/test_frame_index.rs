mod common;

use std::io::Cursor;

use common::{build_frame_header, build_u16_frame, SyntheticDataSet, HEADER_BYTES};
use merlin_core::error::{ErrorKind, MerlinError, Result};
use merlin_core::io::index::{
    build_frame_index, build_frame_index_from, FrameLocation, IndexMode,
};
use merlin_core::io::paths::DataSetPaths;

const COLUMNS: usize = 4;
const ROWS: usize = 2;
const STRIDE: u64 = (HEADER_BYTES + COLUMNS * ROWS * 2) as u64;

/// A data file holding frames with the given zero-based sequence numbers.
fn data_file(sequences: impl IntoIterator<Item = usize>) -> Vec<u8> {
    let pixels = vec![0u16; COLUMNS * ROWS];
    sequences
        .into_iter()
        .flat_map(|s| build_u16_frame(s, COLUMNS, ROWS, &pixels))
        .collect()
}

fn index(files: Vec<Vec<u8>>, mode: IndexMode, expected: usize) -> Result<Vec<FrameLocation>> {
    let sources = files.into_iter().map(|f| Ok(Cursor::new(f)));
    let indexed = build_frame_index_from(sources, mode, expected)?;
    Ok(indexed.index.entries().to_vec())
}

fn at(file: usize, frame_in_file: u64) -> FrameLocation {
    FrameLocation {
        file,
        offset: frame_in_file * STRIDE + HEADER_BYTES as u64,
    }
}

#[test]
fn test_fast_and_scan_agree_on_regular_files() {
    let files = vec![data_file(0..6), data_file(6..10)];
    let fast = index(files.clone(), IndexMode::Fast, 10).unwrap();
    let scan = index(files, IndexMode::Scan, 10).unwrap();

    assert_eq!(fast, scan);
    assert_eq!(fast.len(), 10);
    assert_eq!(fast[0], at(0, 0));
    assert_eq!(fast[5], at(0, 5));
    assert_eq!(fast[6], at(1, 0));
    assert_eq!(fast[9], at(1, 3));
}

#[test]
fn test_fast_mode_extrapolates_gap() {
    // File 1 holds 5 frames, file 2 starts at frame 8 (one-based).
    let files = vec![data_file(0..5), data_file(7..10)];
    let entries = index(files, IndexMode::Fast, 10).unwrap();

    assert_eq!(entries.len(), 10);
    assert_eq!(entries[4], at(0, 4));
    // Frames 5 and 6 are placed after the last frame of file 1.
    assert_eq!(entries[5], at(0, 5));
    assert_eq!(entries[6], at(0, 6));
    assert_eq!(entries[7], at(1, 0));
    assert_eq!(entries[9], at(1, 2));
}

#[test]
fn test_fast_mode_gap_capped_at_declared_total() {
    // A corrupt first header in file 2 claims a huge sequence number.
    let files = vec![data_file(0..3), data_file([1_000_000_000])];
    let entries = index(files, IndexMode::Fast, 6).unwrap();

    assert_eq!(entries.len(), 6);
    assert_eq!(entries[2], at(0, 2));
    assert_eq!(entries[5], at(0, 5));
}

#[test]
fn test_scan_mode_rejects_gap() {
    let files = vec![data_file(0..5), data_file(7..10)];
    let err = index(files, IndexMode::Scan, 10).unwrap_err();
    match err {
        MerlinError::InconsistentFrameHeader { frame, file, .. } => {
            assert_eq!(frame, 5);
            assert_eq!(file, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_scan_mode_rejects_layout_change() {
    let mut file = data_file(0..2);
    let wider = vec![0u16; (COLUMNS + 1) * ROWS];
    file.extend(build_u16_frame(2, COLUMNS + 1, ROWS, &wider));
    let err = index(vec![file], IndexMode::Scan, 3).unwrap_err();
    assert!(matches!(
        err,
        MerlinError::InconsistentFrameHeader { frame: 2, .. }
    ));
    assert_eq!(err.kind(), ErrorKind::FormatError);
}

#[test]
fn test_scan_mode_reports_missing_frames() {
    let err = index(vec![data_file(0..3)], IndexMode::Scan, 5).unwrap_err();
    assert!(matches!(
        err,
        MerlinError::MissingFrames {
            found: 3,
            expected: 5
        }
    ));
}

#[test]
fn test_fast_mode_extrapolates_trailing_frames() {
    let entries = index(vec![data_file(0..3)], IndexMode::Fast, 5).unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[4], at(0, 4));
}

#[test]
fn test_frames_beyond_declared_total_ignored() {
    let entries = index(vec![data_file(0..6)], IndexMode::Scan, 4).unwrap();
    assert_eq!(entries.len(), 4);
}

#[test]
fn test_trailing_partial_header_ends_file() {
    let mut file = data_file(0..2);
    file.extend_from_slice(&build_frame_header(2, COLUMNS, ROWS, "U16")[..64]);
    let entries = index(vec![file], IndexMode::Scan, 0).unwrap();
    assert_eq!(entries.len(), 2);
}

#[test]
fn test_no_frames() {
    let err = index(vec![], IndexMode::Fast, 4).unwrap_err();
    assert!(matches!(err, MerlinError::NoFramesFound));

    let err = index(vec![Vec::new()], IndexMode::Scan, 4).unwrap_err();
    assert!(matches!(err, MerlinError::NoFramesFound));
}

#[test]
fn test_template_and_file_count() {
    let sources = vec![data_file(0..2), data_file(2..4)]
        .into_iter()
        .map(|f| Ok(Cursor::new(f)));
    let indexed = build_frame_index_from(sources, IndexMode::Fast, 4).unwrap();
    assert_eq!(indexed.n_files, 2);
    assert_eq!(indexed.template.columns, COLUMNS);
    assert_eq!(indexed.template.rows, ROWS);
    assert_eq!(indexed.frame_header_bytes(), HEADER_BYTES);
    assert_eq!(indexed.frame_data_bytes(), COLUMNS * ROWS * 2);
}

#[test]
fn test_index_from_disk() {
    let set = SyntheticDataSet::new(COLUMNS, ROWS);
    let pixels = vec![vec![1u16; COLUMNS * ROWS]; 3];
    set.write_data_file(0, 0, &pixels);
    set.write_data_file(1, 3, &pixels);

    let indexed = build_frame_index(&DataSetPaths::new(&set.base), IndexMode::Scan, 6).unwrap();
    assert_eq!(indexed.n_files, 2);
    assert_eq!(indexed.index.len(), 6);
    assert_eq!(indexed.index.locate(3).unwrap(), at(1, 0));

    let err = indexed.index.locate(6).unwrap_err();
    assert!(matches!(
        err,
        MerlinError::FrameIndexOutOfRange { index: 6, total: 6 }
    ));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
