use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ndarray::{Array2, Zip};
use rayon::prelude::*;
use tracing::info;

use crate::error::{MerlinError, Result};
use crate::io::paths::append_suffix;

use super::helpers::write_frame_image;
use super::session::{FrameReader, Session};
use super::types::{ProcessingStage, ProgressReporter, RunKind, RunOptions, RunSummary};

/// Per-pixel mean and standard deviation over a set of frames.
#[derive(Clone, Debug)]
pub struct FrameStatistics {
    pub frames: usize,
    pub mean: Array2<f64>,
    pub sdev: Array2<f64>,
}

/// Running sum and sum of squares of raw frames.
struct Accumulator {
    frames: usize,
    sum: Array2<f64>,
    sumsq: Array2<f64>,
}

impl Accumulator {
    fn new(shape: (usize, usize)) -> Self {
        Self {
            frames: 0,
            sum: Array2::zeros(shape),
            sumsq: Array2::zeros(shape),
        }
    }

    fn add(mut self, data: &Array2<f64>) -> Result<Self> {
        if data.dim() != self.sum.dim() {
            return Err(MerlinError::ShapeMismatch {
                expected: self.sum.len(),
                actual: data.len(),
            });
        }
        Zip::from(&mut self.sum)
            .and(&mut self.sumsq)
            .and(data)
            .for_each(|s, q, &v| {
                *s += v;
                *q += v * v;
            });
        self.frames += 1;
        Ok(self)
    }

    fn merge(mut self, other: Self) -> Self {
        self.sum += &other.sum;
        self.sumsq += &other.sumsq;
        self.frames += other.frames;
        self
    }
}

/// Mean and standard deviation of `frames`.
///
/// Raw frames are accumulated first. The corrections are then applied to the
/// accumulators: the gain once to the sum and twice to the sum of squares,
/// defect correction to the sum and finally to the standard deviation.
pub fn frame_statistics(
    session: &mut Session,
    frames: &[usize],
    reporter: &dyn ProgressReporter,
) -> Result<FrameStatistics> {
    let geometry = session.frame_geometry();
    geometry.ensure_nonempty()?;
    if frames.is_empty() {
        return Err(MerlinError::InvalidGeometry(
            "no frames in the scan ROI".into(),
        ));
    }
    session.refresh_defect_correction();
    let session = &*session;
    let acquisition = session.acquisition()?;
    let shape = geometry.shape();

    let done = AtomicUsize::new(0);
    let accumulated = frames
        .par_iter()
        .map_init(
            || FrameReader::new(session, acquisition),
            |reader, &frame| reader.read_frame(frame),
        )
        .try_fold(
            || Accumulator::new(shape),
            |acc, frame| {
                let acc = acc.add(&frame?.data)?;
                reporter.advance(done.fetch_add(1, Ordering::Relaxed) + 1);
                Ok::<_, MerlinError>(acc)
            },
        )
        .try_reduce(|| Accumulator::new(shape), |a, b| Ok(a.merge(b)))?;

    let Accumulator {
        frames: n,
        mut sum,
        mut sumsq,
    } = accumulated;

    session.apply_gain(&mut sum)?;
    session.apply_defect_correction(&mut sum)?;
    session.apply_gain(&mut sumsq)?;
    session.apply_gain(&mut sumsq)?;

    let scale = 1.0 / n as f64;
    let mean = sum.mapv(|v| v * scale);
    let mut sdev = Zip::from(&sumsq)
        .and(&mean)
        .map_collect(|&q, &m| (q * scale - m * m).max(0.0).sqrt());
    session.apply_defect_correction(&mut sdev)?;

    Ok(FrameStatistics {
        frames: n,
        mean,
        sdev,
    })
}

/// Average the ROI frames and write `<output>_avg.dat` and `<output>_sdev.dat`.
pub fn average_frames(
    session: &mut Session,
    options: &RunOptions,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<RunSummary> {
    let frames = session.roi_frames()?;

    reporter.begin_stage(ProcessingStage::Averaging, Some(frames.len()));
    let stats = frame_statistics(session, &frames, reporter.as_ref())?;
    reporter.finish_stage();
    info!(frames = stats.frames, "Frames averaged");

    reporter.begin_stage(ProcessingStage::Writing, None);
    let avg_path = append_suffix(&options.output, "_avg.dat");
    let sdev_path = append_suffix(&options.output, "_sdev.dat");
    write_frame_image(&avg_path, &stats.mean)?;
    write_frame_image(&sdev_path, &stats.sdev)?;
    reporter.finish_stage();

    Ok(RunSummary {
        kind: RunKind::Average,
        frames: stats.frames,
        roi: session.scan_roi(),
        outputs: vec![avg_path, sdev_path],
    })
}
