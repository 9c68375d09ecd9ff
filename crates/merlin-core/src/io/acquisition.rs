//! Global `.hdr` acquisition header.
//!
//! The header is a line-oriented text file terminated by a line starting with
//! `End`. Only three lines matter here; every other line is skipped so newer
//! header revisions still parse.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use tracing::debug;

use crate::consts::{
    HEADER_END_PREFIX, HEADER_FRAMES_COLUMN, HEADER_FRAMES_PER_TRIGGER_COLUMN,
    HEADER_FRAMES_PER_TRIGGER_PREFIX, HEADER_FRAMES_PREFIX, HEADER_TIMESTAMP_COLUMN,
    HEADER_TIMESTAMP_PREFIX,
};
use crate::error::{MerlinError, Result};
use crate::geometry::ScanGrid;
use crate::io::fields::leading_int;

/// Acquisition-wide information from the global header, completed with the
/// file and byte counts found while indexing the data files.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AcquisitionHeader {
    /// Total number of frames (`columns * rows` for a full scan).
    pub n_frames: usize,
    /// Scan columns (frames per trigger).
    pub n_columns: usize,
    /// Scan rows, derived from frames and columns.
    pub n_rows: usize,
    /// Number of data files.
    pub n_files: usize,
    /// Frame header length in bytes, shared by all frames.
    pub frame_header_bytes: usize,
    /// Frame pixel payload length in bytes, shared by all frames.
    pub frame_data_bytes: usize,
    pub timestamp: String,
}

impl AcquisitionHeader {
    /// Read and parse a header file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => MerlinError::MissingStream(path.to_path_buf()),
            _ => MerlinError::StreamNotReadable {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        Self::read(BufReader::new(file), path)
    }

    /// Parse a header from an open stream; `origin` names it in errors.
    pub fn read<R: BufRead>(mut reader: R, origin: &Path) -> Result<Self> {
        let mut lines = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| MerlinError::StreamNotReadable {
                    path: origin.to_path_buf(),
                    source: e,
                })?;
            if n == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.starts_with(HEADER_END_PREFIX) {
                break;
            }
            lines.push(line.to_string());
        }
        Ok(Self::parse_lines(&lines))
    }

    /// Parse the header lines preceding the `End` line.
    pub fn parse_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut header = Self::default();
        for line in lines.iter().map(AsRef::as_ref) {
            if line.starts_with(HEADER_TIMESTAMP_PREFIX) {
                header.timestamp = field_value(line, HEADER_TIMESTAMP_COLUMN).to_string();
            } else if line.starts_with(HEADER_FRAMES_PREFIX) {
                header.n_frames = leading_int(field_value(line, HEADER_FRAMES_COLUMN)).max(0) as usize;
            } else if line.starts_with(HEADER_FRAMES_PER_TRIGGER_PREFIX) {
                header.n_columns =
                    leading_int(field_value(line, HEADER_FRAMES_PER_TRIGGER_COLUMN)).max(0) as usize;
            }
        }
        header.derive_scan_rows();
        debug!(
            frames = header.n_frames,
            columns = header.n_columns,
            rows = header.n_rows,
            "Parsed acquisition header"
        );
        header
    }

    /// `rows = ceil(frames / columns)` when `frames > columns > 0`; otherwise
    /// rows keep their previous value.
    pub fn derive_scan_rows(&mut self) {
        if self.n_frames > 0 && self.n_frames > self.n_columns && self.n_columns > 0 {
            self.n_rows = self.n_frames / self.n_columns;
            if self.n_frames % self.n_columns != 0 {
                self.n_rows += 1;
            }
        }
    }

    pub fn scan_grid(&self) -> ScanGrid {
        ScanGrid::new(self.n_columns, self.n_rows)
    }

    /// Replace the scan shape once the real frame layout is known.
    pub fn override_scan_shape(&mut self, columns: usize, rows: usize) {
        self.n_columns = columns;
        self.n_rows = rows;
    }

    /// Bytes from one frame header to the next within a data file.
    pub fn frame_stride(&self) -> u64 {
        (self.frame_header_bytes + self.frame_data_bytes) as u64
    }
}

fn field_value(line: &str, column: usize) -> &str {
    line.get(column..).unwrap_or("")
}
