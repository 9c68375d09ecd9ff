use ndarray::Array2;

use crate::error::{MerlinError, Result};

/// Integer width of one stored pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelDepth {
    U8,
    U16,
    U32,
}

impl PixelDepth {
    pub fn bits(self) -> u8 {
        match self {
            Self::U8 => 8,
            Self::U16 => 16,
            Self::U32 => 32,
        }
    }

    pub fn bytes(self) -> usize {
        self.bits() as usize / 8
    }
}

impl TryFrom<u8> for PixelDepth {
    type Error = MerlinError;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            8 => Ok(Self::U8),
            16 => Ok(Self::U16),
            32 => Ok(Self::U32),
            other => Err(MerlinError::UnsupportedPixelDepth(other)),
        }
    }
}

/// Pixel grid of a single frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameGeometry {
    pub columns: usize,
    pub rows: usize,
}

impl FrameGeometry {
    pub const fn new(columns: usize, rows: usize) -> Self {
        Self { columns, rows }
    }

    pub fn pixel_count(&self) -> usize {
        self.columns * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    /// Fails with a geometry error when the frame has no pixels.
    pub fn ensure_nonempty(&self) -> Result<()> {
        if self.is_empty() {
            return Err(MerlinError::InvalidGeometry(format!(
                "frame geometry {}x{} has no pixels",
                self.columns, self.rows
            )));
        }
        Ok(())
    }

    /// `(x, y)` of a row-major pixel index.
    pub fn pixel_pos(&self, index: usize) -> (usize, usize) {
        (index % self.columns, index / self.columns)
    }

    /// Row-major index of `(x, y)`, or `None` outside the frame.
    pub fn pixel_index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.columns as i64 || y >= self.rows as i64 {
            return None;
        }
        Some(x as usize + y as usize * self.columns)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns)
    }
}

/// A decoded detector frame in double precision.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, row-major, shape = (rows, columns)
    pub data: Array2<f64>,
    pub metadata: FrameMetadata,
}

impl Frame {
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.width(), self.height())
    }
}

#[derive(Clone, Debug, Default)]
pub struct FrameMetadata {
    /// Global (acquisition-wide) frame index.
    pub frame_index: usize,
    /// Scan position the frame was recorded at.
    pub scan_pos: (i64, i64),
}

/// Flat row-major view of a pixel buffer.
pub fn pixels(data: &Array2<f64>) -> Result<&[f64]> {
    data.as_slice()
        .ok_or_else(|| MerlinError::InvalidArgument("pixel buffer is not contiguous".into()))
}

/// Mutable flat row-major view of a pixel buffer.
pub fn pixels_mut(data: &mut Array2<f64>) -> Result<&mut [f64]> {
    data.as_slice_mut()
        .ok_or_else(|| MerlinError::InvalidArgument("pixel buffer is not contiguous".into()))
}
