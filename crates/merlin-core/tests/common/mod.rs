#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// Frame header size used by every synthetic acquisition.
pub const HEADER_BYTES: usize = 384;

/// Build a per-frame header of exactly `HEADER_BYTES` bytes.
///
/// `sequence` is zero-based; the header stores it one-based. Trailing fields
/// follow the dwell time and the rest is space padded, like real detector
/// output.
pub fn build_frame_header(sequence: usize, columns: usize, rows: usize, depth: &str) -> Vec<u8> {
    build_frame_header_sized(sequence, columns, rows, depth, HEADER_BYTES)
}

/// Like [`build_frame_header`] but with an arbitrary declared and actual length.
pub fn build_frame_header_sized(
    sequence: usize,
    columns: usize,
    rows: usize,
    depth: &str,
    header_bytes: usize,
) -> Vec<u8> {
    let text = format!(
        "MQ1,{:06},{:05},01,{:04},{:04},{},   1x1,01,2020-11-23 10:27:41.123456,0.001000,\
         0,0,0,1.200000E+2,0.000000E+0,0,0,0,0,0,0,0.000000E+0,MQ1A",
        sequence + 1,
        header_bytes,
        columns,
        rows,
        depth
    );
    let mut buf = text.into_bytes();
    buf.resize(header_bytes.max(buf.len()), b' ');
    buf
}

/// One frame record: U16 header followed by the host-order pixel payload.
pub fn build_u16_frame(sequence: usize, columns: usize, rows: usize, pixels: &[u16]) -> Vec<u8> {
    assert_eq!(pixels.len(), columns * rows);
    let mut buf = build_frame_header(sequence, columns, rows, "U16");
    for p in pixels {
        buf.extend_from_slice(&p.to_ne_bytes());
    }
    buf
}

/// Text of a global `.hdr` file.
pub fn build_acquisition_header(frames: usize, frames_per_trigger: usize) -> String {
    format!(
        "HDR,\t\n\
         Time and Date Stamp (yr, mnth, day, hr, min, s):\t23/11/2020 10:27:41\n\
         Chip ID:\tW530_L8,-,-,-\n\
         Chip Type (Medipix 3.0, Medipix 3.1, Medipix 3RX):\tMedipix 3RX\n\
         Frames in Acquisition (Number):\t{frames}\n\
         Frames per Trigger (Number):\t{frames_per_trigger}\n\
         End\t\n"
    )
}

/// A data set written to a temporary directory as `scan.hdr`, `scan1.mib`, ...
pub struct SyntheticDataSet {
    pub dir: TempDir,
    pub base: PathBuf,
    pub columns: usize,
    pub rows: usize,
}

impl SyntheticDataSet {
    /// Empty data set for frames of `columns x rows` pixels.
    pub fn new(columns: usize, rows: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("scan");
        Self {
            dir,
            base,
            columns,
            rows,
        }
    }

    /// A complete single-file U16 acquisition of `scan_columns x scan_rows`
    /// frames. `value(frame, x, y)` gives every pixel.
    pub fn generate(
        columns: usize,
        rows: usize,
        scan_columns: usize,
        scan_rows: usize,
        value: impl Fn(usize, usize, usize) -> u16,
    ) -> Self {
        let set = Self::new(columns, rows);
        let frames = scan_columns * scan_rows;
        set.write_header(frames, scan_columns);
        let data: Vec<Vec<u16>> = (0..frames)
            .map(|f| set.frame_pixels(|x, y| value(f, x, y)))
            .collect();
        set.write_data_file(0, 0, &data);
        set
    }

    pub fn frame_pixels(&self, value: impl Fn(usize, usize) -> u16) -> Vec<u16> {
        let mut pixels = Vec::with_capacity(self.columns * self.rows);
        for y in 0..self.rows {
            for x in 0..self.columns {
                pixels.push(value(x, y));
            }
        }
        pixels
    }

    pub fn write_header(&self, frames: usize, frames_per_trigger: usize) {
        fs::write(
            self.path("scan.hdr"),
            build_acquisition_header(frames, frames_per_trigger),
        )
        .unwrap();
    }

    /// Write data file `file` (zero-based) holding consecutive frames
    /// starting at zero-based sequence `first_sequence`.
    pub fn write_data_file(&self, file: usize, first_sequence: usize, frames: &[Vec<u16>]) {
        let mut buf = Vec::new();
        for (i, pixels) in frames.iter().enumerate() {
            buf.extend(build_u16_frame(
                first_sequence + i,
                self.columns,
                self.rows,
                pixels,
            ));
        }
        fs::write(self.data_path(file), buf).unwrap();
    }

    pub fn data_path(&self, file: usize) -> PathBuf {
        self.path(&format!("scan{}.mib", file + 1))
    }

    /// Bytes from one frame header to the next.
    pub fn stride(&self) -> u64 {
        (HEADER_BYTES + self.columns * self.rows * 2) as u64
    }

    /// A path inside the temporary directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Write `values` as raw host-order `f32`.
pub fn write_f32_file(path: &std::path::Path, values: &[f32]) {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
    fs::write(path, bytes).unwrap();
}

/// Write `values` as raw host-order `i32`.
pub fn write_i32_file(path: &std::path::Path, values: &[i32]) {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
    fs::write(path, bytes).unwrap();
}

/// Read a raw host-order `f64` file.
pub fn read_f64_file(path: &std::path::Path) -> Vec<f64> {
    fs::read(path)
        .unwrap()
        .chunks_exact(8)
        .map(|c| f64::from_ne_bytes(c.try_into().unwrap()))
        .collect()
}
