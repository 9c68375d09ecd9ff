use std::path::PathBuf;

use crate::geometry::ScanRoi;

/// Processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessingStage {
    Extracting,
    Averaging,
    Integrating,
    CenterOfMass,
    Writing,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extracting => write!(f, "Extracting frames"),
            Self::Averaging => write!(f, "Averaging frames"),
            Self::Integrating => write!(f, "Integrating annular range"),
            Self::CenterOfMass => write!(f, "Computing center of mass"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Thread-safe progress reporting for processing runs.
///
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items in
    /// this stage (e.g., ROI frame count), if known.
    fn begin_stage(&self, _stage: ProcessingStage, _total_items: Option<usize>) {}

    /// `items_done` work items of the current stage have completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// Progress reporter that reports nothing.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Which run produced a [`RunSummary`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunKind {
    Extract,
    Average,
    Integrate,
    CenterOfMass,
}

impl std::fmt::Display for RunKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extract => write!(f, "extract_frames"),
            Self::Average => write!(f, "average_frames"),
            Self::Integrate => write!(f, "integrate_annular_range"),
            Self::CenterOfMass => write!(f, "center_of_mass"),
        }
    }
}

/// Outcome of a completed run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub kind: RunKind,
    /// ROI frames processed.
    pub frames: usize,
    pub roi: ScanRoi,
    /// Data files written, sidecars excluded. Empty when there was nothing to write.
    pub outputs: Vec<PathBuf>,
}

/// Output location and switches shared by all runs.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Output path (extract, integrate) or base name (average, center of mass).
    pub output: PathBuf,
    /// Also write the annular detector mask as `<output>.det`.
    pub debug: bool,
}

impl RunOptions {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            debug: false,
        }
    }
}
