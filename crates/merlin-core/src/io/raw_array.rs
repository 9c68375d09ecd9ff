//! Memory-mapped readers for raw binary arrays (defect masks, gain maps).

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, NativeEndian};
use memmap2::Mmap;
use tracing::warn;

use crate::error::{MerlinError, Result};

/// Contents of a raw array file, in host byte order.
pub struct RawArrayFile {
    path: PathBuf,
    mmap: Option<Mmap>,
}

impl RawArrayFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => MerlinError::MissingStream(path.to_path_buf()),
            _ => MerlinError::OpenFailed {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        let len = file.metadata()?.len();
        // Mapping an empty file fails on some platforms.
        let mmap = if len == 0 {
            None
        } else {
            Some(unsafe { Mmap::map(&file)? })
        };
        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    /// Read `count` 32-bit signed integers. Missing trailing items are zero.
    pub fn read_i32(&self, count: usize) -> Vec<i32> {
        let mut values = vec![0i32; count];
        let available = self.available(count, 4);
        NativeEndian::read_i32_into(&self.bytes()[..available * 4], &mut values[..available]);
        values
    }

    /// Read exactly `count` 32-bit floats, widened to `f64`.
    pub fn read_f32_exact(&self, count: usize) -> Result<Vec<f64>> {
        let bytes = self.bytes();
        if bytes.len() < count * 4 {
            return Err(MerlinError::ShapeMismatch {
                expected: count,
                actual: bytes.len() / 4,
            });
        }
        let mut values = vec![0f32; count];
        NativeEndian::read_f32_into(&bytes[..count * 4], &mut values);
        Ok(values.into_iter().map(f64::from).collect())
    }

    fn available(&self, count: usize, item_bytes: usize) -> usize {
        let available = (self.bytes().len() / item_bytes).min(count);
        if available < count {
            warn!(
                file = %self.path.display(),
                expected = count,
                found = available,
                "Raw array file is shorter than one frame"
            );
        }
        available
    }
}
