use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MerlinError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input not found: {}", .0.display())]
    MissingStream(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    StreamNotReadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to reposition stream to byte offset {offset}")]
    RepositionFailed { offset: u64 },

    #[error("Unexpected end of stream at byte offset {offset}")]
    UnexpectedEof { offset: u64 },

    #[error("Truncated frame header: field '{field}' lies outside the header")]
    TruncatedHeader { field: &'static str },

    #[error("Unsupported frame header size: {0} bytes")]
    UnsupportedHeaderSize(i64),

    #[error("Unsupported pixel depth: {0} bits")]
    UnsupportedPixelDepth(u8),

    #[error("Inconsistent frame header for frame {frame} in file {file}: {detail}")]
    InconsistentFrameHeader {
        frame: usize,
        file: usize,
        detail: String,
    },

    #[error("Frame header scan found {found} frames, expected {expected}")]
    MissingFrames { found: usize, expected: usize },

    #[error("No frame headers found")]
    NoFramesFound,

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid scan ROI ({x0},{y0})-({x1},{y1})")]
    InvalidRoi { x0: i64, y0: i64, x1: i64, y1: i64 },

    #[error("Pixel ({x},{y}) outside the {columns}x{rows} frame")]
    PixelOutOfBounds {
        x: i64,
        y: i64,
        columns: usize,
        rows: usize,
    },

    #[error("Shape mismatch: expected {expected} items, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Defect correction table is stale; refresh it before correcting")]
    StaleDefectCorrection,

    #[error("Frame index has not been built")]
    NoFrameIndex,
}

/// Coarse error classes shared by every core operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    StreamFailure,
    FormatError,
    GeometryError,
    StateError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::StreamFailure => write!(f, "stream failure"),
            Self::FormatError => write!(f, "format error"),
            Self::GeometryError => write!(f, "geometry error"),
            Self::StateError => write!(f, "state error"),
        }
    }
}

impl MerlinError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) | Self::FrameIndexOutOfRange { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::Io(_)
            | Self::MissingStream(_)
            | Self::StreamNotReadable { .. }
            | Self::OpenFailed { .. }
            | Self::RepositionFailed { .. }
            | Self::UnexpectedEof { .. } => ErrorKind::StreamFailure,
            Self::TruncatedHeader { .. }
            | Self::UnsupportedHeaderSize(_)
            | Self::UnsupportedPixelDepth(_)
            | Self::InconsistentFrameHeader { .. }
            | Self::MissingFrames { .. }
            | Self::NoFramesFound => ErrorKind::FormatError,
            Self::InvalidGeometry(_) | Self::InvalidRoi { .. } | Self::PixelOutOfBounds { .. } => {
                ErrorKind::GeometryError
            }
            Self::ShapeMismatch { .. } | Self::StaleDefectCorrection | Self::NoFrameIndex => {
                ErrorKind::StateError
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, MerlinError>;
