use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array2;
use rayon::prelude::*;
use tracing::info;

use crate::consts::PARALLEL_FRAME_THRESHOLD;
use crate::error::Result;
use crate::frame::{pixels, FrameGeometry};
use crate::io::raw_writer::{write_f64_file, write_sidecar, SidecarInfo};

use super::session::{FrameReader, Session};
use super::types::ProgressReporter;

/// Run `op` on every frame of `frames` and return the results in the order
/// of `frames`.
///
/// Large batches are spread over the Rayon pool, one [`FrameReader`] per
/// worker. The first failing frame aborts the batch.
pub(super) fn map_frames<'a, T, F>(
    session: &'a Session,
    frames: &[usize],
    reporter: &dyn ProgressReporter,
    op: F,
) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&mut FrameReader<'a>, usize) -> Result<T> + Sync,
{
    let acquisition = session.acquisition()?;
    let done = AtomicUsize::new(0);
    let step = |reader: &mut FrameReader<'a>, frame: usize| -> Result<T> {
        let value = op(reader, frame)?;
        reporter.advance(done.fetch_add(1, Ordering::Relaxed) + 1);
        Ok(value)
    };

    if frames.len() < PARALLEL_FRAME_THRESHOLD {
        let mut reader = FrameReader::new(session, acquisition);
        return frames.iter().map(|&f| step(&mut reader, f)).collect();
    }

    frames
        .par_iter()
        .map_init(
            || FrameReader::new(session, acquisition),
            |reader, &frame| step(reader, frame),
        )
        .collect()
}

/// Write a frame-sized `f64` image with its sidecar.
pub(super) fn write_frame_image(path: &Path, image: &Array2<f64>) -> Result<()> {
    let geometry = FrameGeometry::new(image.ncols(), image.nrows());
    write_f64_file(path, pixels(image)?)?;
    write_sidecar(path, &float_sidecar(path, image.len(), geometry.columns, geometry.rows))?;
    info!(file = %path.display(), columns = geometry.columns, rows = geometry.rows, "Written frame image");
    Ok(())
}

/// Write one `f64` value per scan position with its sidecar.
pub(super) fn write_scan_values(path: &Path, values: &[f64], columns: usize, rows: usize) -> Result<()> {
    write_f64_file(path, values)?;
    write_sidecar(path, &float_sidecar(path, values.len(), columns, rows))?;
    info!(file = %path.display(), items = values.len(), columns, rows, "Written scan data");
    Ok(())
}

fn float_sidecar(path: &Path, items: usize, columns: usize, rows: usize) -> SidecarInfo {
    SidecarInfo::Floats {
        file_name: path.display().to_string(),
        items,
        columns,
        rows,
    }
}
