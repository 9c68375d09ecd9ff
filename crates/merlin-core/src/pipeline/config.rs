use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::geometry::{AnnularRange, FrameCalibration, ScanRoi};
use crate::io::index::IndexMode;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Data set base path: `<input>.hdr`, `<input>1.mib`, ...
    pub input: PathBuf,
    /// Base path of the output files.
    pub output: PathBuf,
    #[serde(default)]
    pub index: IndexMode,
    #[serde(default)]
    pub swap_bytes: bool,
    #[serde(default)]
    pub calibration: FrameCalibration,
    #[serde(default)]
    pub annular_range: AnnularRange,
    /// Absent selects the full scan grid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_roi: Option<ScanRoi>,
    #[serde(default)]
    pub corrections: CorrectionConfig,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("input"),
            output: PathBuf::from("output"),
            index: IndexMode::default(),
            swap_bytes: false,
            calibration: FrameCalibration::default(),
            annular_range: AnnularRange::default(),
            scan_roi: None,
            corrections: CorrectionConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// Raw `i32` mask, non-zero marks a defect pixel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defect_mask: Option<PathBuf>,
    /// Text file with one `x,y` defect pixel per line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defect_list: Option<PathBuf>,
    #[serde(default)]
    pub defect_pixels: Vec<[i64; 2]>,
    /// Raw `f32` gain factors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain_correction: Option<PathBuf>,
}
