pub mod defect;
pub mod gain;

pub use defect::{DefectCorrectionList, DefectEntry};
pub use gain::{apply_gain, GainCorrectionMap};
