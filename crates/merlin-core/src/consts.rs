/// Number of bytes read before the declared frame header length is known.
/// Always covers the header id, sequence number and header length fields.
pub const FRAME_HEADER_PREFIX_BYTES: usize = 128;

/// Largest frame header accepted by the decoder.
pub const FRAME_HEADER_SIZE_MAX: usize = 2048;

/// Extension of the global acquisition header file.
pub const HEADER_FILE_EXTENSION: &str = "hdr";

/// Extension of the numbered frame data files.
pub const DATA_FILE_EXTENSION: &str = "mib";

/// Line prefix that terminates the global header.
pub const HEADER_END_PREFIX: &str = "End";

/// Global header line carrying the acquisition timestamp.
pub const HEADER_TIMESTAMP_PREFIX: &str = "Time and Date Stamp (yr, mnth, day, hr, min, s):";
/// Column at which the timestamp value starts.
pub const HEADER_TIMESTAMP_COLUMN: usize = 49;

/// Global header line carrying the total frame count.
pub const HEADER_FRAMES_PREFIX: &str = "Frames in Acquisition (Number):";
/// Column at which the frame count starts.
pub const HEADER_FRAMES_COLUMN: usize = 32;

/// Global header line carrying the frames per trigger (scan columns).
pub const HEADER_FRAMES_PER_TRIGGER_PREFIX: &str = "Frames per Trigger (Number):";
/// Column at which the frames-per-trigger value starts.
pub const HEADER_FRAMES_PER_TRIGGER_COLUMN: usize = 29;

/// Minimum frame count to use frame-level Rayon parallelism.
pub const PARALLEL_FRAME_THRESHOLD: usize = 4;

/// Fraction of frame pixels below which the annular detector sums over its
/// inside-pixel list instead of the full mask.
pub const SPARSE_MASK_FRACTION: f64 = 0.5;
