use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::consts::{DATA_FILE_EXTENSION, HEADER_FILE_EXTENSION};

/// File naming of one acquisition: `<base>.hdr` plus `<base>1.mib`, `<base>2.mib`, ...
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataSetPaths {
    base: PathBuf,
}

impl DataSetPaths {
    /// `base` is the shared file name stem, without index or extension.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn header_file(&self) -> PathBuf {
        self.with_suffix(&format!(".{HEADER_FILE_EXTENSION}"))
    }

    /// Path of the data file with zero-based index `file`.
    pub fn data_file(&self, file: usize) -> PathBuf {
        self.with_suffix(&format!("{}.{DATA_FILE_EXTENSION}", file + 1))
    }

    /// Data files present on disk, probing increasing indices until one is missing.
    pub fn existing_data_files(&self) -> Vec<PathBuf> {
        (0..)
            .map(|i| self.data_file(i))
            .take_while(|p| p.is_file())
            .collect()
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        append_suffix(&self.base, suffix)
    }
}

/// `path` with `suffix` appended to its final component.
pub fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
