//! Global frame index spanning all data files of an acquisition.
//!
//! Two strategies locate the frames:
//!
//! * [`IndexMode::Fast`] decodes only the first header of every file and
//!   assumes a regular layout in between. Frames missing between the last
//!   indexed frame and the next file's first frame (or the declared total)
//!   are placed by stepping the last known offset by the frame stride.
//! * [`IndexMode::Scan`] decodes every header and verifies each against the
//!   first one. Any deviation or missing frame is an error.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{MerlinError, Result};
use crate::io::frame_header::{decode_frame_header, FrameHeaderTemplate};
use crate::io::paths::DataSetPaths;

/// Where a frame's pixel payload starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameLocation {
    /// Zero-based data file index.
    pub file: usize,
    /// Byte offset of the pixel payload within the file.
    pub offset: u64,
}

/// Dense map from global frame number to payload location.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameIndex {
    entries: Vec<FrameLocation>,
}

impl FrameIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn locate(&self, frame: usize) -> Result<FrameLocation> {
        self.entries
            .get(frame)
            .copied()
            .ok_or(MerlinError::FrameIndexOutOfRange {
                index: frame,
                total: self.entries.len(),
            })
    }

    pub fn entries(&self) -> &[FrameLocation] {
        &self.entries
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexMode {
    /// Read the first header of each file and extrapolate the rest.
    #[default]
    Fast,
    /// Read and verify every frame header.
    Scan,
}

impl std::fmt::Display for IndexMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "Fast"),
            Self::Scan => write!(f, "Scan"),
        }
    }
}

/// Result of indexing the data files.
#[derive(Clone, Debug)]
pub struct IndexedAcquisition {
    pub index: FrameIndex,
    /// Header of the first frame of the acquisition.
    pub template: FrameHeaderTemplate,
    pub n_files: usize,
}

impl IndexedAcquisition {
    pub fn frame_header_bytes(&self) -> usize {
        self.template.header_bytes
    }

    pub fn frame_data_bytes(&self) -> usize {
        self.template.data_bytes()
    }
}

/// Index the data files of `paths`, probing `<base>1.mib`, `<base>2.mib`, ...
/// until a file is missing.
pub fn build_frame_index(
    paths: &DataSetPaths,
    mode: IndexMode,
    expected_frames: usize,
) -> Result<IndexedAcquisition> {
    let files = paths.existing_data_files();
    let sources = files.into_iter().map(|path| {
        File::open(&path)
            .map(BufReader::new)
            .map_err(|source| MerlinError::OpenFailed { path, source })
    });
    build_frame_index_from(sources, mode, expected_frames)
}

/// Index an ordered sequence of data streams.
pub fn build_frame_index_from<R, I>(
    sources: I,
    mode: IndexMode,
    expected_frames: usize,
) -> Result<IndexedAcquisition>
where
    R: Read + Seek,
    I: IntoIterator<Item = Result<R>>,
{
    let mut builder = IndexBuilder::new(mode, expected_frames);
    let mut n_files = 0;
    for source in sources {
        let mut reader = source?;
        builder.visit_file(n_files, &mut reader)?;
        debug!(file = n_files, frames = builder.entries.len(), "Indexed data file");
        n_files += 1;
    }
    let indexed = builder.finish(n_files, expected_frames)?;
    info!(
        frames = indexed.index.len(),
        files = indexed.n_files,
        mode = %mode,
        "Frame index built"
    );
    Ok(indexed)
}

struct IndexBuilder {
    mode: IndexMode,
    /// Declared frame total, 0 if unknown.
    limit: usize,
    entries: Vec<FrameLocation>,
    template: Option<FrameHeaderTemplate>,
    stride: u64,
    data_bytes: u64,
}

impl IndexBuilder {
    fn new(mode: IndexMode, limit: usize) -> Self {
        Self {
            mode,
            limit,
            entries: Vec::new(),
            template: None,
            stride: 0,
            data_bytes: 0,
        }
    }

    fn seed(&mut self, header: &FrameHeaderTemplate) {
        self.data_bytes = header.data_bytes() as u64;
        self.stride = header.header_bytes as u64 + self.data_bytes;
        self.template = Some(header.clone());
    }

    fn visit_file<R: Read + Seek>(&mut self, file: usize, reader: &mut R) -> Result<()> {
        loop {
            let header = match decode_frame_header(reader) {
                Ok(header) => header,
                Err(MerlinError::UnexpectedEof { .. }) => return Ok(()),
                Err(e) => return Err(e),
            };
            let payload = reader.stream_position()?;
            if self.template.is_none() {
                self.seed(&header);
            }

            match self.mode {
                IndexMode::Fast => {
                    if !self.entries.is_empty() {
                        self.fill_gap_to(header.sequence, file);
                    }
                    self.entries.push(FrameLocation {
                        file,
                        offset: payload,
                    });
                    return Ok(());
                }
                IndexMode::Scan => {
                    self.verify(&header, file)?;
                    self.entries.push(FrameLocation {
                        file,
                        offset: payload,
                    });
                    let next = payload + self.data_bytes;
                    reader
                        .seek(SeekFrom::Start(next))
                        .map_err(|_| MerlinError::RepositionFailed { offset: next })?;
                }
            }
        }
    }

    fn verify(&self, header: &FrameHeaderTemplate, file: usize) -> Result<()> {
        let frame = self.entries.len();
        let mismatch = self
            .template
            .as_ref()
            .and_then(|template| template.layout_mismatch(header));
        if let Some(detail) = mismatch {
            return Err(MerlinError::InconsistentFrameHeader {
                frame,
                file,
                detail,
            });
        }
        if header.sequence != frame as i64 {
            return Err(MerlinError::InconsistentFrameHeader {
                frame,
                file,
                detail: format!("sequence index {} != {}", header.sequence, frame),
            });
        }
        Ok(())
    }

    /// Fast mode: a file starting at `sequence` implies the frames up to it
    /// belong to the previous file. The fill stops at the declared total.
    fn fill_gap_to(&mut self, sequence: i64, file: usize) {
        let next = self.entries.len() as i64;
        if sequence < next {
            warn!(
                file,
                sequence,
                expected = next,
                "Data file starts before the next expected frame"
            );
            return;
        }
        let mut target = sequence as usize;
        if self.limit > 0 && target > self.limit {
            warn!(
                file,
                sequence,
                limit = self.limit,
                "Data file starts beyond the declared frame total"
            );
            target = self.limit;
        }
        self.extrapolate_to(target);
    }

    /// Append entries stepping from the last known one until `len` entries exist.
    fn extrapolate_to(&mut self, len: usize) {
        let Some(mut last) = self.entries.last().copied() else {
            return;
        };
        while self.entries.len() < len {
            last.offset += self.stride;
            self.entries.push(last);
        }
    }

    fn finish(mut self, n_files: usize, expected_frames: usize) -> Result<IndexedAcquisition> {
        if n_files == 0 || self.entries.is_empty() {
            return Err(MerlinError::NoFramesFound);
        }
        let template = self.template.take().ok_or(MerlinError::NoFramesFound)?;

        if self.entries.len() < expected_frames {
            match self.mode {
                IndexMode::Scan => {
                    return Err(MerlinError::MissingFrames {
                        found: self.entries.len(),
                        expected: expected_frames,
                    });
                }
                IndexMode::Fast => {
                    debug!(
                        found = self.entries.len(),
                        expected = expected_frames,
                        "Extrapolating trailing frames"
                    );
                    self.extrapolate_to(expected_frames);
                }
            }
        }
        if expected_frames > 0 && self.entries.len() > expected_frames {
            debug!(
                found = self.entries.len(),
                expected = expected_frames,
                "Ignoring frames beyond the declared total"
            );
            self.entries.truncate(expected_frames);
        }

        Ok(IndexedAcquisition {
            index: FrameIndex {
                entries: self.entries,
            },
            template,
            n_files,
        })
    }
}
