use std::path::Path;

use ndarray::{Array2, Zip};
use tracing::info;

use crate::error::{MerlinError, Result};
use crate::frame::FrameGeometry;
use crate::io::raw_array::RawArrayFile;

/// Per-pixel multiplicative gain factors for one frame geometry.
#[derive(Clone, Debug)]
pub struct GainCorrectionMap {
    factors: Array2<f64>,
}

impl GainCorrectionMap {
    pub fn new(factors: Array2<f64>) -> Self {
        Self { factors }
    }

    /// Load a raw array of 32-bit floats, one per frame pixel, row-major.
    pub fn load(path: &Path, geometry: FrameGeometry) -> Result<Self> {
        geometry.ensure_nonempty()?;
        let file = RawArrayFile::open(path)?;
        let values = file.read_f32_exact(geometry.pixel_count())?;
        let factors = Array2::from_shape_vec(geometry.shape(), values)
            .map_err(|e| MerlinError::InvalidGeometry(e.to_string()))?;
        info!(file = %path.display(), pixels = geometry.pixel_count(), "Gain correction loaded");
        Ok(Self { factors })
    }

    pub fn factors(&self) -> &Array2<f64> {
        &self.factors
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.factors.ncols(), self.factors.nrows())
    }

    /// Multiply `data` in place by the gain factors.
    pub fn apply(&self, data: &mut Array2<f64>) -> Result<()> {
        if data.dim() != self.factors.dim() {
            return Err(MerlinError::ShapeMismatch {
                expected: self.factors.len(),
                actual: data.len(),
            });
        }
        Zip::from(data)
            .and(&self.factors)
            .for_each(|value, &gain| *value *= gain);
        Ok(())
    }
}

/// Apply an optional gain map; without one the buffer is left unchanged.
pub fn apply_gain(map: Option<&GainCorrectionMap>, data: &mut Array2<f64>) -> Result<()> {
    match map {
        Some(map) => map.apply(data),
        None => Ok(()),
    }
}
