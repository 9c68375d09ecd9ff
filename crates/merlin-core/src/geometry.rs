//! Scan-grid and frame-pixel coordinate helpers.
//!
//! Two coordinate systems meet here: the raster-scan grid (one frame per scan
//! pixel) and the pixel grid of a single frame. The frame grid can be mapped
//! to physical coordinates through an affine [`FrameCalibration`].

use serde::{Deserialize, Serialize};

use crate::error::{MerlinError, Result};

/// Non-negative remainder, `imod(-1, 4) == 3`.
pub fn imod(i: i64, n: i64) -> i64 {
    i.rem_euclid(n)
}

/// A 2-D position in physical (calibrated) units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalPos {
    pub x: f64,
    pub y: f64,
}

impl PhysicalPos {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn magnitude(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// Affine map from frame-pixel coordinates to physical coordinates.
///
/// ```text
/// dx = x - offset.x,  dy = y - offset.y
/// physical.x = dx * a0.x + dy * a1.x
/// physical.y = dx * a0.y + dy * a1.y
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameCalibration {
    /// Origin of the physical coordinate system, in frame pixels.
    pub offset: PhysicalPos,
    /// First basis vector.
    pub a0: PhysicalPos,
    /// Second basis vector.
    pub a1: PhysicalPos,
}

impl Default for FrameCalibration {
    fn default() -> Self {
        Self {
            offset: PhysicalPos::new(0.0, 0.0),
            a0: PhysicalPos::new(1.0, 0.0),
            a1: PhysicalPos::new(0.0, 1.0),
        }
    }
}

impl FrameCalibration {
    pub fn to_physical(&self, x: f64, y: f64) -> PhysicalPos {
        let dx = x - self.offset.x;
        let dy = y - self.offset.y;
        PhysicalPos {
            x: dx * self.a0.x + dy * self.a1.x,
            y: dx * self.a0.y + dy * self.a1.y,
        }
    }
}

/// Radial range of an annular virtual detector. `max <= min` disables it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnularRange {
    pub min: f64,
    pub max: f64,
}

impl AnnularRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_enabled(&self) -> bool {
        self.max > self.min
    }

    /// Half-open membership test, `min <= radius < max`.
    pub fn contains(&self, radius: f64) -> bool {
        radius >= self.min && radius < self.max
    }
}

/// Rectangular region of the scan grid with inclusive bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRoi {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl ScanRoi {
    pub fn new(x0: i64, y0: i64, x1: i64, y1: i64) -> Result<Self> {
        let roi = Self { x0, y0, x1, y1 };
        roi.validate()?;
        Ok(roi)
    }

    /// The ROI covering a whole `columns x rows` scan grid.
    pub fn full(grid: ScanGrid) -> Self {
        Self {
            x0: 0,
            y0: 0,
            x1: grid.columns as i64 - 1,
            y1: grid.rows as i64 - 1,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.x1 < self.x0 || self.y1 < self.y0 {
            return Err(MerlinError::InvalidRoi {
                x0: self.x0,
                y0: self.y0,
                x1: self.x1,
                y1: self.y1,
            });
        }
        Ok(())
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    pub fn columns(&self) -> usize {
        (self.x1 - self.x0 + 1).max(0) as usize
    }

    pub fn rows(&self) -> usize {
        (self.y1 - self.y0 + 1).max(0) as usize
    }

    /// The part of the ROI that lies on `grid`, `None` if they do not overlap.
    pub fn clamp_to(&self, grid: ScanGrid) -> Option<Self> {
        let roi = Self {
            x0: self.x0.max(0),
            y0: self.y0.max(0),
            x1: self.x1.min(grid.columns as i64 - 1),
            y1: self.y1.min(grid.rows as i64 - 1),
        };
        roi.validate().ok().map(|()| roi)
    }

    /// Whether every corner lies on the given scan grid.
    pub fn fits(&self, grid: ScanGrid) -> bool {
        self.x0 >= 0
            && self.y0 >= 0
            && self.x1 < grid.columns as i64
            && self.y1 < grid.rows as i64
    }
}

/// Raster-scan grid: one frame per scan pixel, row-major.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanGrid {
    pub columns: usize,
    pub rows: usize,
}

impl ScanGrid {
    pub const fn new(columns: usize, rows: usize) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.columns * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<()> {
        if self.columns == 0 || self.rows == 0 {
            return Err(MerlinError::InvalidGeometry(format!(
                "scan grid {}x{} is empty",
                self.columns, self.rows
            )));
        }
        Ok(())
    }

    /// Scan position `(x, y)` of a global frame index.
    pub fn scan_pixel(&self, frame: usize) -> Result<(i64, i64)> {
        self.check()?;
        let cols = self.columns as i64;
        let idx = frame as i64;
        let x = imod(idx, cols);
        let y = imod((idx - x) / cols, self.rows as i64);
        Ok((x, y))
    }

    /// Global frame index of scan position `(x, y)`.
    pub fn frame_index(&self, x: i64, y: i64) -> Result<usize> {
        self.check()?;
        if x < 0 || x >= self.columns as i64 || y < 0 || y >= self.rows as i64 {
            return Err(MerlinError::PixelOutOfBounds {
                x,
                y,
                columns: self.columns,
                rows: self.rows,
            });
        }
        Ok(x as usize + y as usize * self.columns)
    }
}
