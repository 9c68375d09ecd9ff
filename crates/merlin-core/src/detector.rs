//! Annular virtual detector.
//!
//! Every frame pixel is mapped to physical coordinates once per geometry.
//! Pixels whose physical radius falls in the annular range form the detector
//! mask; integration and center of mass read only those pixels.

use ndarray::{Array2, Zip};
use tracing::debug;

use crate::consts::SPARSE_MASK_FRACTION;
use crate::error::{MerlinError, Result};
use crate::frame::{pixels, FrameGeometry};
use crate::geometry::{AnnularRange, FrameCalibration, PhysicalPos};

/// Sum and center of mass of one frame under the detector mask.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DetectorReadout {
    pub sum: f64,
    /// `(0, 0)` when `sum <= 0`.
    pub com: PhysicalPos,
}

#[derive(Clone, Debug)]
pub struct AnnularDetector {
    geometry: FrameGeometry,
    mask: Array2<bool>,
    /// Row-major indices of the pixels inside the annulus.
    inside: Vec<usize>,
    /// Physical x of every frame pixel.
    x: Array2<f64>,
    /// Physical y of every frame pixel.
    y: Array2<f64>,
    sparse: bool,
}

impl AnnularDetector {
    pub fn build(
        geometry: FrameGeometry,
        calibration: &FrameCalibration,
        range: AnnularRange,
    ) -> Result<Self> {
        geometry.ensure_nonempty()?;
        let coords = Array2::from_shape_fn(geometry.shape(), |(row, col)| {
            calibration.to_physical(col as f64, row as f64)
        });
        let mask = coords.map(|p| range.contains(p.magnitude()));
        let x = coords.map(|p| p.x);
        let y = coords.map(|p| p.y);

        let inside: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| m.then_some(i))
            .collect();
        let sparse = (inside.len() as f64) <= SPARSE_MASK_FRACTION * geometry.pixel_count() as f64;

        debug!(
            columns = geometry.columns,
            rows = geometry.rows,
            inside = inside.len(),
            min = range.min,
            max = range.max,
            sparse,
            "Annular detector prepared"
        );

        Ok(Self {
            geometry,
            mask,
            inside,
            x,
            y,
            sparse,
        })
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn mask(&self) -> &Array2<bool> {
        &self.mask
    }

    pub fn inside_indices(&self) -> &[usize] {
        &self.inside
    }

    pub fn inside_count(&self) -> usize {
        self.inside.len()
    }

    /// Whether frame pixel `(x, y)` lies inside the annulus. Out-of-frame
    /// positions are outside.
    pub fn is_inside(&self, x: i64, y: i64) -> bool {
        self.geometry
            .pixel_index(x, y)
            .is_some_and(|i| self.mask.as_slice().is_some_and(|m| m[i]))
    }

    /// Physical coordinates of frame pixel `(x, y)`.
    pub fn physical(&self, x: usize, y: usize) -> Option<PhysicalPos> {
        Some(PhysicalPos::new(*self.x.get((y, x))?, *self.y.get((y, x))?))
    }

    /// The mask as 1.0 inside / 0.0 outside.
    pub fn mask_as_f64(&self) -> Array2<f64> {
        self.mask.map(|&m| if m { 1.0 } else { 0.0 })
    }

    fn check(&self, data: &Array2<f64>) -> Result<()> {
        if data.dim() != self.mask.dim() {
            return Err(MerlinError::ShapeMismatch {
                expected: self.mask.len(),
                actual: data.len(),
            });
        }
        Ok(())
    }

    /// Sum of the pixel values inside the annulus.
    pub fn sum_masked(&self, data: &Array2<f64>) -> Result<f64> {
        self.check(data)?;
        if self.sparse {
            let values = pixels(data)?;
            return Ok(self.inside.iter().map(|&i| values[i]).sum());
        }
        let mut sum = 0.0;
        Zip::from(data).and(&self.mask).for_each(|&v, &m| {
            if m {
                sum += v;
            }
        });
        Ok(sum)
    }

    /// Intensity-weighted mean physical position inside the annulus, with the
    /// masked sum it was normalized by.
    pub fn center_of_mass_masked(&self, data: &Array2<f64>) -> Result<DetectorReadout> {
        let sum = self.sum_masked(data)?;
        if sum <= 0.0 {
            return Ok(DetectorReadout {
                sum,
                com: PhysicalPos::default(),
            });
        }

        let (mut mx, mut my) = (0.0, 0.0);
        if self.sparse {
            let values = pixels(data)?;
            let xs = pixels(&self.x)?;
            let ys = pixels(&self.y)?;
            for &i in &self.inside {
                mx += xs[i] * values[i];
                my += ys[i] * values[i];
            }
        } else {
            Zip::from(data)
                .and(&self.mask)
                .and(&self.x)
                .and(&self.y)
                .for_each(|&v, &m, &x, &y| {
                    if m {
                        mx += x * v;
                        my += y * v;
                    }
                });
        }

        Ok(DetectorReadout {
            sum,
            com: PhysicalPos::new(mx / sum, my / sum),
        })
    }
}
