pub mod config;
mod average;
mod extract;
mod helpers;
mod integrate;
mod session;
mod types;

pub use average::{average_frames, frame_statistics, FrameStatistics};
pub use extract::extract_frames;
pub use integrate::{center_of_mass, center_of_mass_frames, integrate_annular_range, integrate_frames};
pub use session::{FrameReader, Session};
pub use types::{
    NoOpReporter, ProcessingStage, ProgressReporter, RunKind, RunOptions, RunSummary,
};
