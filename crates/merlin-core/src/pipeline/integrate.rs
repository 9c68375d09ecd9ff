use std::sync::Arc;

use tracing::info;

use crate::detector::{AnnularDetector, DetectorReadout};
use crate::error::{MerlinError, Result};
use crate::frame::pixels;
use crate::io::paths::append_suffix;
use crate::io::raw_writer::write_f64_file;

use super::helpers::{map_frames, write_scan_values};
use super::session::Session;
use super::types::{ProcessingStage, ProgressReporter, RunKind, RunOptions, RunSummary};

/// Check the preconditions of a detector run and build the detector.
///
/// Nothing is read if the frame has no pixels, the acquisition has no frames
/// or the annular range is disabled.
fn prepare_detector(session: &mut Session, options: &RunOptions) -> Result<AnnularDetector> {
    session.frame_geometry().ensure_nonempty()?;
    if session.frame_count() == 0 {
        return Err(MerlinError::InvalidGeometry(
            "acquisition has no frames".into(),
        ));
    }
    let range = session.annular_range();
    if !range.is_enabled() {
        return Err(MerlinError::InvalidArgument(format!(
            "invalid annular range ({}, {})",
            range.min, range.max
        )));
    }

    session.refresh_defect_correction();
    let detector = session.build_annular_detector()?;
    if options.debug {
        let path = append_suffix(&options.output, ".det");
        write_f64_file(&path, pixels(&detector.mask_as_f64())?)?;
        info!(file = %path.display(), inside = detector.inside_count(), "Written detector mask");
    }
    Ok(detector)
}

/// `(columns, rows)` of the ROI part that lies on the scan grid.
fn output_shape(session: &Session) -> (usize, usize) {
    session
        .scan_roi()
        .clamp_to(session.scan_grid())
        .map_or((0, 0), |roi| (roi.columns(), roi.rows()))
}

/// Corrected masked sum of every frame, in the order of `frames`.
pub fn integrate_frames(
    session: &Session,
    frames: &[usize],
    detector: &AnnularDetector,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<f64>> {
    map_frames(session, frames, reporter, |reader, frame| {
        detector.sum_masked(&reader.read_corrected(frame)?.data)
    })
}

/// Corrected masked sum and center of mass of every frame, in the order of `frames`.
pub fn center_of_mass_frames(
    session: &Session,
    frames: &[usize],
    detector: &AnnularDetector,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<DetectorReadout>> {
    map_frames(session, frames, reporter, |reader, frame| {
        detector.center_of_mass_masked(&reader.read_corrected(frame)?.data)
    })
}

/// Integrate the annular detector over every ROI frame and write one value
/// per frame to `options.output`.
pub fn integrate_annular_range(
    session: &mut Session,
    options: &RunOptions,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<RunSummary> {
    let detector = prepare_detector(session, options)?;
    let session = &*session;
    let frames = session.roi_frames()?;

    reporter.begin_stage(ProcessingStage::Integrating, Some(frames.len()));
    let sums = integrate_frames(session, &frames, &detector, reporter.as_ref())?;
    reporter.finish_stage();

    let roi = session.scan_roi();
    let mut outputs = Vec::new();
    if sums.is_empty() {
        info!("No results calculated, output skipped");
    } else {
        reporter.begin_stage(ProcessingStage::Writing, None);
        let (columns, rows) = output_shape(session);
        write_scan_values(&options.output, &sums, columns, rows)?;
        reporter.finish_stage();
        outputs.push(options.output.clone());
    }

    Ok(RunSummary {
        kind: RunKind::Integrate,
        frames: sums.len(),
        roi,
        outputs,
    })
}

/// Masked sum and center of mass over every ROI frame, written to
/// `<output>_0-0.dat` (sums), `<output>_1-0.dat` (x) and `<output>_1-1.dat` (y).
pub fn center_of_mass(
    session: &mut Session,
    options: &RunOptions,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<RunSummary> {
    let detector = prepare_detector(session, options)?;
    let session = &*session;
    let frames = session.roi_frames()?;

    reporter.begin_stage(ProcessingStage::CenterOfMass, Some(frames.len()));
    let readouts = center_of_mass_frames(session, &frames, &detector, reporter.as_ref())?;
    reporter.finish_stage();

    let roi = session.scan_roi();
    let mut outputs = Vec::new();
    if readouts.is_empty() {
        info!("No results calculated, output skipped");
    } else {
        reporter.begin_stage(ProcessingStage::Writing, None);
        let (columns, rows) = output_shape(session);
        let channels: [(&str, fn(&DetectorReadout) -> f64); 3] = [
            ("_0-0.dat", |r| r.sum),
            ("_1-0.dat", |r| r.com.x),
            ("_1-1.dat", |r| r.com.y),
        ];
        for (suffix, value) in channels {
            let path = append_suffix(&options.output, suffix);
            let values: Vec<f64> = readouts.iter().map(value).collect();
            write_scan_values(&path, &values, columns, rows)?;
            outputs.push(path);
        }
        reporter.finish_stage();
    }

    Ok(RunSummary {
        kind: RunKind::CenterOfMass,
        frames: readouts.len(),
        roi,
        outputs,
    })
}
