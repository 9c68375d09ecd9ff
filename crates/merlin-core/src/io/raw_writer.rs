use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{NativeEndian, WriteBytesExt};

use crate::error::{MerlinError, Result};
use crate::io::paths::append_suffix;

/// Streams raw binary output: frame payloads or 64-bit float arrays.
pub struct RawArrayWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    items_written: usize,
}

impl RawArrayWriter {
    /// Create (truncate) the output file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| MerlinError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            items_written: 0,
        })
    }

    /// Append one block of raw bytes, counted as one item.
    pub fn write_block(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.items_written += 1;
        Ok(())
    }

    /// Append 64-bit floats in host byte order, each counted as one item.
    pub fn write_f64s(&mut self, values: &[f64]) -> Result<()> {
        for &v in values {
            self.writer.write_f64::<NativeEndian>(v)?;
        }
        self.items_written += values.len();
        Ok(())
    }

    pub fn items_written(&self) -> usize {
        self.items_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the file.
    pub fn finalize(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Write a complete `f64` array file.
pub fn write_f64_file(path: &Path, values: &[f64]) -> Result<()> {
    let mut writer = RawArrayWriter::create(path)?;
    writer.write_f64s(values)?;
    writer.finalize()
}

/// Text description written next to a raw output file.
#[derive(Clone, Debug, PartialEq)]
pub enum SidecarInfo {
    /// Raw frame payloads copied from the data files.
    Frames {
        file_name: String,
        frames: usize,
        columns: usize,
        rows: usize,
        bits: u8,
    },
    /// A 64-bit float array of `columns x rows` values.
    Floats {
        file_name: String,
        items: usize,
        columns: usize,
        rows: usize,
    },
}

impl SidecarInfo {
    pub fn to_text(&self) -> String {
        match self {
            Self::Frames {
                file_name,
                frames,
                columns,
                rows,
                bits,
            } => format!(
                "File name: {file_name}\nNumber of frames: {frames}\nFrame columns: {columns}\n\
                 Frame rows: {rows}\nData integer bits: {bits}\n"
            ),
            Self::Floats {
                file_name,
                items,
                columns,
                rows,
            } => format!(
                "File name: {file_name}\nNumber of items: {items}\nColumns: {columns}\n\
                 Rows: {rows}\nData float bits: 64\n"
            ),
        }
    }
}

/// Path of the sidecar of `data_path`: `<data_path>.hdr`.
pub fn sidecar_path(data_path: &Path) -> PathBuf {
    append_suffix(data_path, ".hdr")
}

/// Write the sidecar of `data_path`, returning its path.
pub fn write_sidecar(data_path: &Path, info: &SidecarInfo) -> Result<PathBuf> {
    let path = sidecar_path(data_path);
    std::fs::write(&path, info.to_text()).map_err(|source| MerlinError::OpenFailed {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
