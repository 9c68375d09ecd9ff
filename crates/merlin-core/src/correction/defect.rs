//! Defect pixel registry and neighbor interpolation.
//!
//! Each registered defect keeps a cached list of the valid pixels of its 3x3
//! neighborhood: inside the frame, not itself and not another defect. Any
//! change to the defect set marks the caches stale; [`DefectCorrectionList::refresh`]
//! must run before the next correction pass.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::error::{MerlinError, Result};
use crate::frame::{pixels_mut, FrameGeometry};
use crate::io::raw_array::RawArrayFile;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefectEntry {
    /// Row-major frame pixel index.
    pub index: usize,
    pub x: usize,
    pub y: usize,
    /// Valid neighbor pixel indices used for interpolation.
    pub neighbors: Vec<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct DefectCorrectionList {
    geometry: FrameGeometry,
    entries: Vec<DefectEntry>,
    lookup: HashSet<usize>,
    modified: bool,
}

impl DefectCorrectionList {
    pub fn new(geometry: FrameGeometry) -> Self {
        Self {
            geometry,
            ..Default::default()
        }
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DefectEntry] {
        &self.entries
    }

    /// Whether the defect set changed since the last refresh.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn is_defect_index(&self, index: usize) -> bool {
        self.lookup.contains(&index)
    }

    pub fn is_defect(&self, x: i64, y: i64) -> bool {
        self.geometry
            .pixel_index(x, y)
            .is_some_and(|index| self.is_defect_index(index))
    }

    fn index_of(&self, x: i64, y: i64) -> Result<usize> {
        self.geometry.ensure_nonempty()?;
        self.geometry
            .pixel_index(x, y)
            .ok_or(MerlinError::PixelOutOfBounds {
                x,
                y,
                columns: self.geometry.columns,
                rows: self.geometry.rows,
            })
    }

    fn insert(&mut self, index: usize) -> bool {
        if !self.lookup.insert(index) {
            return false;
        }
        let (x, y) = self.geometry.pixel_pos(index);
        self.entries.push(DefectEntry {
            index,
            x,
            y,
            neighbors: Vec::new(),
        });
        self.modified = true;
        true
    }

    /// Register the pixel at `(x, y)`. Returns `false` if it already was a defect.
    pub fn set_defect_pixel(&mut self, x: i64, y: i64) -> Result<bool> {
        let index = self.index_of(x, y)?;
        Ok(self.insert(index))
    }

    /// Remove the pixel at `(x, y)`. Returns `false` if it was not registered.
    pub fn unset_defect_pixel(&mut self, x: i64, y: i64) -> Result<bool> {
        let index = self.index_of(x, y)?;
        if !self.lookup.remove(&index) {
            return Ok(false);
        }
        self.entries.retain(|entry| entry.index != index);
        self.modified = !self.entries.is_empty();
        Ok(true)
    }

    /// Remove every defect.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lookup.clear();
        self.modified = false;
    }

    /// Register every non-zero pixel of a raw mask of 32-bit integers.
    /// Returns the number of newly added defects.
    pub fn load_mask(&mut self, path: &Path) -> Result<usize> {
        self.geometry.ensure_nonempty()?;
        let mask = RawArrayFile::open(path)?.read_i32(self.geometry.pixel_count());
        let added = mask
            .iter()
            .enumerate()
            .filter(|(_, &flag)| flag != 0)
            .filter(|(index, _)| self.insert(*index))
            .count();
        if added > 0 {
            info!(file = %path.display(), added, "Defect mask loaded");
        } else {
            info!(file = %path.display(), "Defect mask adds no defects");
        }
        Ok(added)
    }

    /// Register the `x,y` pairs listed one per line in a text file.
    ///
    /// Blank lines are ignored. Lines that fail to parse or name a pixel
    /// outside the frame are logged and skipped.
    pub fn load_list(&mut self, path: &Path) -> Result<usize> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MerlinError::MissingStream(path.to_path_buf()),
            _ => MerlinError::StreamNotReadable {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        let before = self.entries.len();
        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let outcome = parse_pixel_pair(line)
                .ok_or_else(|| MerlinError::InvalidArgument(format!("expected 'x,y', got '{line}'")))
                .and_then(|(x, y)| self.set_defect_pixel(x, y));
            if let Err(e) = outcome {
                warn!(file = %path.display(), line = line_no + 1, error = %e, "Skipping defect list line");
            }
        }
        let added = self.entries.len() - before;
        info!(file = %path.display(), added, "Defect list loaded");
        Ok(added)
    }

    /// Rebuild the neighbor caches of all defects.
    pub fn update(&mut self) {
        let geometry = self.geometry;
        let lookup = &self.lookup;
        for entry in &mut self.entries {
            entry.neighbors.clear();
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let Some(index) = geometry.pixel_index(entry.x as i64 + dx, entry.y as i64 + dy)
                    else {
                        continue;
                    };
                    if lookup.contains(&index) {
                        continue;
                    }
                    entry.neighbors.push(index);
                }
            }
            debug!(
                x = entry.x,
                y = entry.y,
                neighbors = entry.neighbors.len(),
                "Defect correction neighbors"
            );
        }
        self.modified = false;
    }

    /// Rebuild the neighbor caches if the defect set changed.
    pub fn refresh(&mut self) {
        if self.modified {
            self.update();
        }
    }

    /// Replace each defect pixel by the mean of its valid neighbors.
    ///
    /// Defects without valid neighbors keep their value.
    pub fn apply(&self, data: &mut Array2<f64>) -> Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        if self.modified {
            return Err(MerlinError::StaleDefectCorrection);
        }
        if data.dim() != self.geometry.shape() {
            return Err(MerlinError::ShapeMismatch {
                expected: self.geometry.pixel_count(),
                actual: data.len(),
            });
        }
        let pixels = pixels_mut(data)?;
        for entry in &self.entries {
            if entry.neighbors.is_empty() {
                continue;
            }
            let sum: f64 = entry.neighbors.iter().map(|&i| pixels[i]).sum();
            pixels[entry.index] = sum / entry.neighbors.len() as f64;
        }
        Ok(())
    }
}

/// Parse `"x,y"` (comma and/or space separated).
fn parse_pixel_pair(line: &str) -> Option<(i64, i64)> {
    let mut parts = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty());
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    Some((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pixel_pair() {
        assert_eq!(parse_pixel_pair("3,4"), Some((3, 4)));
        assert_eq!(parse_pixel_pair(" 3 , 4 "), Some((3, 4)));
        assert_eq!(parse_pixel_pair("3 4"), Some((3, 4)));
        assert_eq!(parse_pixel_pair("3"), None);
        assert_eq!(parse_pixel_pair("a,b"), None);
    }
}
