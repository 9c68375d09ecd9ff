//! Processing session: everything known about one acquisition.
//!
//! A [`Session`] owns the parsed headers, the frame index, the scan region of
//! interest, the detector calibration and the pixel corrections. Processing
//! runs borrow it immutably; every mutation happens between runs.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::correction::{apply_gain, DefectCorrectionList, GainCorrectionMap};
use crate::detector::AnnularDetector;
use crate::error::{MerlinError, Result};
use crate::frame::{Frame, FrameGeometry, FrameMetadata, PixelDepth};
use crate::geometry::{AnnularRange, FrameCalibration, ScanGrid, ScanRoi};
use crate::io::acquisition::AcquisitionHeader;
use crate::io::frame_header::FrameHeaderTemplate;
use crate::io::index::{build_frame_index, FrameLocation, IndexMode, IndexedAcquisition};
use crate::io::paths::DataSetPaths;
use crate::io::pixel::{decode_pixels, read_raw};

use super::config::ProcessingConfig;

#[derive(Clone, Debug, Default)]
pub struct Session {
    paths: Option<DataSetPaths>,
    header: AcquisitionHeader,
    acquisition: Option<IndexedAcquisition>,
    calibration: FrameCalibration,
    annular_range: AnnularRange,
    scan_roi: Option<ScanRoi>,
    defects: DefectCorrectionList,
    gain: Option<GainCorrectionMap>,
    index_mode: IndexMode,
    swap_bytes: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load header and index of `config.input` and apply every setting of
    /// `config`, corrections included.
    pub fn from_config(config: &ProcessingConfig) -> Result<Self> {
        let mut session = Self::new();
        session.set_index_mode(config.index);
        session.set_swap_bytes(config.swap_bytes);
        session.load_header(&config.input)?;
        session.build_frame_index()?;
        session.set_calibration(config.calibration);
        session.set_annular_range(config.annular_range);
        session.set_scan_roi(config.scan_roi)?;

        let corrections = &config.corrections;
        if let Some(path) = &corrections.defect_mask {
            session.load_defect_mask(path)?;
        }
        if let Some(path) = &corrections.defect_list {
            session.load_defect_list(path)?;
        }
        for &[x, y] in &corrections.defect_pixels {
            session.set_defect_pixel(x, y)?;
        }
        if let Some(path) = &corrections.gain_correction {
            session.load_gain_correction(path)?;
        }
        Ok(session)
    }

    // --- acquisition ---

    pub fn index_mode(&self) -> IndexMode {
        self.index_mode
    }

    pub fn set_index_mode(&mut self, mode: IndexMode) {
        self.index_mode = mode;
    }

    pub fn swap_bytes(&self) -> bool {
        self.swap_bytes
    }

    pub fn set_swap_bytes(&mut self, swap: bool) {
        self.swap_bytes = swap;
    }

    /// Parse `<base>.hdr`. Any previous frame index is discarded.
    pub fn load_header(&mut self, base: impl Into<PathBuf>) -> Result<&AcquisitionHeader> {
        let paths = DataSetPaths::new(base);
        let header = AcquisitionHeader::open(&paths.header_file())?;
        info!(
            file = %paths.header_file().display(),
            frames = header.n_frames,
            columns = header.n_columns,
            rows = header.n_rows,
            "Acquisition header loaded"
        );
        self.header = header;
        self.paths = Some(paths);
        self.acquisition = None;
        Ok(&self.header)
    }

    /// Index the data files and adopt the frame layout found there.
    pub fn build_frame_index(&mut self) -> Result<&IndexedAcquisition> {
        let paths = self.paths.as_ref().ok_or_else(|| {
            MerlinError::InvalidArgument("no acquisition header loaded".into())
        })?;
        let indexed = build_frame_index(paths, self.index_mode, self.header.n_frames)?;

        self.header.n_files = indexed.n_files;
        self.header.frame_header_bytes = indexed.frame_header_bytes();
        self.header.frame_data_bytes = indexed.frame_data_bytes();
        self.header.n_frames = indexed.index.len();
        self.fix_degenerate_scan_grid();
        self.adopt_frame_geometry(indexed.template.geometry());

        let indexed = &*self.acquisition.insert(indexed);
        Ok(indexed)
    }

    fn fix_degenerate_scan_grid(&mut self) {
        let frames = self.header.n_frames;
        if self.header.n_columns == 0 {
            self.header.override_scan_shape(frames, 1);
        } else if self.header.n_rows == 0 {
            let rows = frames.div_ceil(self.header.n_columns);
            self.header.override_scan_shape(self.header.n_columns, rows);
        } else {
            return;
        }
        debug!(
            columns = self.header.n_columns,
            rows = self.header.n_rows,
            "Scan grid derived from frame count"
        );
    }

    /// Drop corrections that were set up for a different frame geometry.
    fn adopt_frame_geometry(&mut self, geometry: FrameGeometry) {
        if self.defects.geometry() != geometry {
            if !self.defects.is_empty() {
                warn!(
                    defects = self.defects.len(),
                    "Frame geometry changed, defect list discarded"
                );
            }
            self.defects = DefectCorrectionList::new(geometry);
        }
        if self.gain.as_ref().is_some_and(|g| g.geometry() != geometry) {
            warn!("Frame geometry changed, gain correction discarded");
            self.gain = None;
        }
    }

    pub fn paths(&self) -> Option<&DataSetPaths> {
        self.paths.as_ref()
    }

    pub fn header(&self) -> &AcquisitionHeader {
        &self.header
    }

    pub fn acquisition(&self) -> Result<&IndexedAcquisition> {
        self.acquisition.as_ref().ok_or(MerlinError::NoFrameIndex)
    }

    pub fn template(&self) -> Result<&FrameHeaderTemplate> {
        Ok(&self.acquisition()?.template)
    }

    /// Frame pixel grid; empty before indexing.
    pub fn frame_geometry(&self) -> FrameGeometry {
        self.acquisition
            .as_ref()
            .map(|a| a.template.geometry())
            .unwrap_or_default()
    }

    pub fn frame_count(&self) -> usize {
        self.acquisition.as_ref().map_or(0, |a| a.index.len())
    }

    // --- scan grid ---

    pub fn scan_grid(&self) -> ScanGrid {
        self.header.scan_grid()
    }

    /// Scan position of a global frame index.
    pub fn scan_pixel(&self, frame: usize) -> Result<(i64, i64)> {
        self.scan_grid().scan_pixel(frame)
    }

    /// Global frame index recorded at scan position `(x, y)`.
    pub fn frame_index_at(&self, x: i64, y: i64) -> Result<usize> {
        self.scan_grid().frame_index(x, y)
    }

    /// `(x, y)` of a frame pixel index.
    pub fn frame_pixel(&self, index: usize) -> Result<(usize, usize)> {
        let geometry = self.frame_geometry();
        geometry.ensure_nonempty()?;
        if index >= geometry.pixel_count() {
            return Err(MerlinError::InvalidArgument(format!(
                "frame pixel index {index} outside {} pixels",
                geometry.pixel_count()
            )));
        }
        Ok(geometry.pixel_pos(index))
    }

    /// Frame pixel index of `(x, y)`.
    pub fn frame_pixel_index(&self, x: i64, y: i64) -> Result<usize> {
        let geometry = self.frame_geometry();
        geometry.ensure_nonempty()?;
        geometry
            .pixel_index(x, y)
            .ok_or(MerlinError::PixelOutOfBounds {
                x,
                y,
                columns: geometry.columns,
                rows: geometry.rows,
            })
    }

    /// Data file and payload offset of a global frame.
    pub fn frame_location(&self, frame: usize) -> Result<FrameLocation> {
        self.acquisition()?.index.locate(frame)
    }

    /// Effective scan ROI: the configured one or the whole grid.
    pub fn scan_roi(&self) -> ScanRoi {
        self.scan_roi
            .unwrap_or_else(|| ScanRoi::full(self.scan_grid()))
    }

    /// Restrict processing to `roi`; `None` selects the whole scan grid.
    pub fn set_scan_roi(&mut self, roi: Option<ScanRoi>) -> Result<()> {
        if let Some(roi) = roi {
            roi.validate()?;
            let grid = self.scan_grid();
            if !grid.is_empty() && !roi.fits(grid) {
                warn!(
                    x0 = roi.x0,
                    y0 = roi.y0,
                    x1 = roi.x1,
                    y1 = roi.y1,
                    columns = grid.columns,
                    rows = grid.rows,
                    "Scan ROI exceeds the scan grid"
                );
            }
        }
        self.scan_roi = roi;
        Ok(())
    }

    pub fn in_scan_roi(&self, x: i64, y: i64) -> bool {
        self.scan_roi().contains(x, y)
    }

    /// `(columns, rows)` of the effective scan ROI.
    pub fn scan_roi_size(&self) -> (usize, usize) {
        let roi = self.scan_roi();
        (roi.columns(), roi.rows())
    }

    /// Global indices of all frames inside the scan ROI, ascending.
    pub fn roi_frames(&self) -> Result<Vec<usize>> {
        let roi = self.scan_roi();
        let grid = self.scan_grid();
        let mut frames = Vec::new();
        for frame in 0..self.frame_count() {
            let (x, y) = grid.scan_pixel(frame)?;
            if roi.contains(x, y) {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    // --- detector ---

    pub fn calibration(&self) -> &FrameCalibration {
        &self.calibration
    }

    pub fn set_calibration(&mut self, calibration: FrameCalibration) {
        self.calibration = calibration;
    }

    pub fn annular_range(&self) -> AnnularRange {
        self.annular_range
    }

    pub fn set_annular_range(&mut self, range: AnnularRange) {
        if !range.is_enabled() {
            debug!(min = range.min, max = range.max, "Annular range disabled");
        }
        self.annular_range = range;
    }

    pub fn build_annular_detector(&self) -> Result<AnnularDetector> {
        AnnularDetector::build(self.frame_geometry(), &self.calibration, self.annular_range)
    }

    // --- corrections ---

    pub fn defects(&self) -> &DefectCorrectionList {
        &self.defects
    }

    pub fn set_defect_pixel(&mut self, x: i64, y: i64) -> Result<bool> {
        self.defects.set_defect_pixel(x, y)
    }

    pub fn unset_defect_pixel(&mut self, x: i64, y: i64) -> Result<bool> {
        self.defects.unset_defect_pixel(x, y)
    }

    pub fn unset_defect_list(&mut self) {
        self.defects.clear();
    }

    pub fn load_defect_mask(&mut self, path: &Path) -> Result<usize> {
        self.defects.load_mask(path)
    }

    pub fn load_defect_list(&mut self, path: &Path) -> Result<usize> {
        self.defects.load_list(path)
    }

    /// Rebuild the defect neighbor caches if the defect set changed.
    pub fn refresh_defect_correction(&mut self) {
        self.defects.refresh();
    }

    pub fn gain(&self) -> Option<&GainCorrectionMap> {
        self.gain.as_ref()
    }

    /// Load a gain map for the current frame geometry, replacing any previous one.
    pub fn load_gain_correction(&mut self, path: &Path) -> Result<()> {
        self.gain = Some(GainCorrectionMap::load(path, self.frame_geometry())?);
        Ok(())
    }

    pub fn unset_gain_correction(&mut self) {
        self.gain = None;
    }

    pub fn apply_gain(&self, data: &mut Array2<f64>) -> Result<()> {
        apply_gain(self.gain.as_ref(), data)
    }

    pub fn apply_defect_correction(&self, data: &mut Array2<f64>) -> Result<()> {
        self.defects.apply(data)
    }

    // --- frames ---

    /// A reader with its own data file handle.
    pub fn frame_reader(&self) -> Result<FrameReader<'_>> {
        Ok(FrameReader::new(self, self.acquisition()?))
    }

    /// Decode one frame without corrections.
    pub fn decode_frame(&self, frame: usize) -> Result<Frame> {
        self.frame_reader()?.read_frame(frame)
    }

    /// Raw payload bytes of one frame.
    pub fn read_raw_frame(&self, frame: usize) -> Result<Vec<u8>> {
        self.frame_reader()?.read_raw(frame)
    }
}

/// Reads frames of an indexed acquisition, keeping the data file of the
/// previous read open.
///
/// Each worker owns one reader; handles are never shared.
pub struct FrameReader<'a> {
    session: &'a Session,
    acquisition: &'a IndexedAcquisition,
    open: Option<(usize, BufReader<File>)>,
}

impl<'a> FrameReader<'a> {
    pub(crate) fn new(session: &'a Session, acquisition: &'a IndexedAcquisition) -> Self {
        Self {
            session,
            acquisition,
            open: None,
        }
    }

    fn handle(&mut self, file: usize) -> Result<&mut BufReader<File>> {
        if self.open.as_ref().map(|(f, _)| *f) != Some(file) {
            let paths = self
                .session
                .paths
                .as_ref()
                .ok_or_else(|| MerlinError::InvalidArgument("no acquisition header loaded".into()))?;
            let path = paths.data_file(file);
            let handle = File::open(&path).map_err(|source| MerlinError::OpenFailed { path, source })?;
            self.open = Some((file, BufReader::new(handle)));
        }
        match self.open.as_mut() {
            Some((_, reader)) => Ok(reader),
            None => Err(MerlinError::NoFrameIndex),
        }
    }

    /// Raw payload bytes of a global frame.
    pub fn read_raw(&mut self, frame: usize) -> Result<Vec<u8>> {
        let location = self.acquisition.index.locate(frame)?;
        let data_bytes = self.acquisition.frame_data_bytes();
        let reader = self.handle(location.file)?;
        read_raw(reader, location.offset, data_bytes)
    }

    fn pixel_depth(&self) -> Result<PixelDepth> {
        self.acquisition.template.pixel_depth()
    }

    /// Decode a global frame without corrections.
    pub fn read_frame(&mut self, frame: usize) -> Result<Frame> {
        let raw = self.read_raw(frame)?;
        let data = decode_pixels(
            &raw,
            self.acquisition.template.geometry(),
            self.pixel_depth()?,
            self.session.swap_bytes,
        )?;
        let scan_pos = self.session.scan_pixel(frame).unwrap_or_default();
        Ok(Frame {
            data,
            metadata: FrameMetadata {
                frame_index: frame,
                scan_pos,
            },
        })
    }

    /// Decode a global frame and apply gain and defect correction.
    pub fn read_corrected(&mut self, frame: usize) -> Result<Frame> {
        let mut decoded = self.read_frame(frame)?;
        self.session.apply_gain(&mut decoded.data)?;
        self.session.apply_defect_correction(&mut decoded.data)?;
        Ok(decoded)
    }
}
