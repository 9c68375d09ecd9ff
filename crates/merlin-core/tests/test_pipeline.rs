mod common;

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;

use common::{read_f64_file, write_f32_file, SyntheticDataSet};
use merlin_core::error::{ErrorKind, MerlinError};
use merlin_core::frame::FrameGeometry;
use merlin_core::geometry::{AnnularRange, ScanGrid, ScanRoi};
use merlin_core::io::index::IndexMode;
use merlin_core::pipeline::config::ProcessingConfig;
use merlin_core::pipeline::{
    average_frames, center_of_mass, extract_frames, frame_statistics, integrate_annular_range,
    NoOpReporter, ProcessingStage, ProgressReporter, RunKind, RunOptions, Session,
};

/// 4x4 frames on a 3x2 scan; pixel `(x, y)` of frame `f` is `10 f + x + 4 y`.
fn ramp_data_set() -> SyntheticDataSet {
    SyntheticDataSet::generate(4, 4, 3, 2, |f, x, y| (10 * f + x + 4 * y) as u16)
}

fn open(set: &SyntheticDataSet) -> Session {
    let mut session = Session::new();
    session.load_header(&set.base).unwrap();
    session.build_frame_index().unwrap();
    session
}

fn no_op() -> Arc<dyn ProgressReporter> {
    Arc::new(NoOpReporter)
}

/// Sum over a whole ramp frame.
fn ramp_frame_sum(frame: usize) -> f64 {
    160.0 * frame as f64 + 120.0
}

#[derive(Default)]
struct RecordingReporter {
    stages: Mutex<Vec<ProcessingStage>>,
    advanced: AtomicUsize,
}

impl ProgressReporter for RecordingReporter {
    fn begin_stage(&self, stage: ProcessingStage, _total_items: Option<usize>) {
        self.stages.lock().unwrap().push(stage);
    }

    fn advance(&self, items_done: usize) {
        self.advanced.fetch_max(items_done, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Session setup
// ---------------------------------------------------------------------------

#[test]
fn test_open_session() {
    let set = ramp_data_set();
    let session = open(&set);

    assert_eq!(session.frame_count(), 6);
    assert_eq!(session.scan_grid(), ScanGrid::new(3, 2));
    assert_eq!(session.frame_geometry(), FrameGeometry::new(4, 4));
    assert_eq!(session.header().n_files, 1);
    assert_eq!(session.header().frame_header_bytes, common::HEADER_BYTES);
    assert_eq!(session.header().frame_data_bytes, 32);
    assert_eq!(session.scan_roi(), ScanRoi::new(0, 0, 2, 1).unwrap());
}

#[test]
fn test_scan_and_pixel_coordinates() {
    let set = ramp_data_set();
    let session = open(&set);

    assert_eq!(session.scan_pixel(4).unwrap(), (1, 1));
    assert_eq!(session.frame_index_at(2, 1).unwrap(), 5);
    for frame in 0..6 {
        let (x, y) = session.scan_pixel(frame).unwrap();
        assert_eq!(session.frame_index_at(x, y).unwrap(), frame);
    }
    assert!(session.frame_index_at(3, 0).is_err());

    assert_eq!(session.frame_pixel(6).unwrap(), (2, 1));
    assert_eq!(session.frame_pixel_index(2, 1).unwrap(), 6);
    assert!(session.frame_pixel(16).is_err());
    let err = session.frame_pixel_index(4, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeometryError);

    let location = session.frame_location(2).unwrap();
    assert_eq!(location.file, 0);
    assert_eq!(location.offset, 2 * set.stride() + common::HEADER_BYTES as u64);
}

#[test]
fn test_decode_frame() {
    let set = ramp_data_set();
    let session = open(&set);

    let frame = session.decode_frame(4).unwrap();
    assert_eq!(frame.metadata.frame_index, 4);
    assert_eq!(frame.metadata.scan_pos, (1, 1));
    assert_eq!(frame.geometry(), FrameGeometry::new(4, 4));
    assert_eq!(frame.data[[0, 0]], 40.0);
    assert_eq!(frame.data[[2, 3]], 51.0);

    assert_eq!(session.read_raw_frame(0).unwrap().len(), 32);
}

#[test]
fn test_swap_bytes() {
    let set = SyntheticDataSet::generate(2, 2, 2, 2, |_, _, _| 0x0100);
    let mut session = open(&set);
    session.set_swap_bytes(true);
    assert_eq!(session.decode_frame(0).unwrap().data[[0, 0]], 1.0);
}

#[test]
fn test_session_requires_header_and_index() {
    let mut session = Session::new();
    let err = session.build_frame_index().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(matches!(session.acquisition(), Err(MerlinError::NoFrameIndex)));
    assert!(matches!(
        session.decode_frame(0),
        Err(MerlinError::NoFrameIndex)
    ));
    assert_eq!(session.frame_count(), 0);
}

#[test]
fn test_defects_need_indexed_geometry() {
    let mut session = Session::new();
    let err = session.set_defect_pixel(0, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeometryError);
}

#[test]
fn test_missing_data_files() {
    let set = SyntheticDataSet::new(4, 4);
    set.write_header(4, 2);
    let mut session = Session::new();
    session.load_header(&set.base).unwrap();
    let err = session.build_frame_index().unwrap_err();
    assert!(matches!(err, MerlinError::NoFramesFound));
}

#[test]
fn test_scan_grid_from_frame_count_without_trigger() {
    let set = SyntheticDataSet::generate(2, 2, 5, 1, |f, _, _| f as u16);
    set.write_header(5, 0);
    let session = open(&set);
    assert_eq!(session.scan_grid(), ScanGrid::new(5, 1));
}

#[test]
fn test_single_row_scan_grid() {
    let set = SyntheticDataSet::generate(2, 2, 5, 1, |f, _, _| f as u16);
    let session = open(&set);
    assert_eq!(session.scan_grid(), ScanGrid::new(5, 1));
    assert_eq!(session.roi_frames().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_fast_index_past_end_of_data() {
    let set = ramp_data_set();
    set.write_header(8, 4);
    let session = open(&set);
    assert_eq!(session.frame_count(), 8);
    let err = session.decode_frame(7).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StreamFailure);
}

#[test]
fn test_scan_index_rejects_missing_frames() {
    let set = ramp_data_set();
    set.write_header(8, 4);
    let mut session = Session::new();
    session.set_index_mode(IndexMode::Scan);
    session.load_header(&set.base).unwrap();
    let err = session.build_frame_index().unwrap_err();
    assert!(matches!(
        err,
        MerlinError::MissingFrames {
            found: 6,
            expected: 8
        }
    ));
}

#[test]
fn test_scan_roi_selects_frames() {
    let set = ramp_data_set();
    let mut session = open(&set);
    session
        .set_scan_roi(Some(ScanRoi::new(1, 0, 2, 1).unwrap()))
        .unwrap();

    assert_eq!(session.roi_frames().unwrap(), vec![1, 2, 4, 5]);
    assert_eq!(session.scan_roi_size(), (2, 2));
    assert!(session.in_scan_roi(1, 1));
    assert!(!session.in_scan_roi(0, 1));

    session.set_scan_roi(None).unwrap();
    assert_eq!(session.roi_frames().unwrap().len(), 6);
}

#[test]
fn test_invalid_scan_roi() {
    let mut session = Session::new();
    let roi = ScanRoi {
        x0: 3,
        y0: 0,
        x1: 1,
        y1: 0,
    };
    let err = session.set_scan_roi(Some(roi)).unwrap_err();
    assert!(matches!(err, MerlinError::InvalidRoi { .. }));
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[test]
fn test_extract_frames() {
    let set = ramp_data_set();
    let mut session = open(&set);
    session
        .set_scan_roi(Some(ScanRoi::new(0, 1, 2, 1).unwrap()))
        .unwrap();
    let output = set.path("frames.raw");

    let summary = extract_frames(&session, &RunOptions::new(&output), no_op()).unwrap();
    assert_eq!(summary.kind, RunKind::Extract);
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.outputs, vec![output.clone()]);

    let bytes = fs::read(&output).unwrap();
    assert_eq!(bytes.len(), 3 * 32);
    assert_eq!(&bytes[..32], session.read_raw_frame(3).unwrap().as_slice());

    let sidecar = fs::read_to_string(set.path("frames.raw.hdr")).unwrap();
    assert_eq!(
        sidecar,
        format!(
            "File name: {}\nNumber of frames: 3\nFrame columns: 4\nFrame rows: 4\nData integer bits: 16\n",
            output.display()
        )
    );
}

#[test]
fn test_average_frames() {
    let set = ramp_data_set();
    let mut session = open(&set);
    let output = set.path("result");
    let reporter = Arc::new(RecordingReporter::default());

    let summary = average_frames(&mut session, &RunOptions::new(&output), reporter.clone()).unwrap();
    assert_eq!(summary.frames, 6);
    assert_eq!(
        summary.outputs,
        vec![set.path("result_avg.dat"), set.path("result_sdev.dat")]
    );
    assert_eq!(reporter.advanced.load(Ordering::Relaxed), 6);
    assert_eq!(
        *reporter.stages.lock().unwrap(),
        vec![ProcessingStage::Averaging, ProcessingStage::Writing]
    );

    let mean = read_f64_file(&set.path("result_avg.dat"));
    let sdev = read_f64_file(&set.path("result_sdev.dat"));
    assert_eq!(mean.len(), 16);
    // Frame means 0..50 step 10 average to 25, standard deviation 10 * sqrt(35 / 12).
    let expected_sdev = 10.0 * (35.0f64 / 12.0).sqrt();
    for (i, (&m, &s)) in mean.iter().zip(&sdev).enumerate() {
        assert_relative_eq!(m, 25.0 + i as f64, max_relative = 1e-12);
        assert_relative_eq!(s, expected_sdev, max_relative = 1e-9);
    }
    assert!(set.path("result_avg.dat.hdr").is_file());
}

#[test]
fn test_frame_statistics_of_constant_frames() {
    let set = SyntheticDataSet::generate(3, 3, 2, 2, |_, x, _| 7 + x as u16);
    let mut session = open(&set);
    let frames = session.roi_frames().unwrap();
    let stats = frame_statistics(&mut session, &frames, &NoOpReporter).unwrap();

    assert_eq!(stats.frames, 4);
    assert_eq!(stats.mean[[1, 2]], 9.0);
    assert!(stats.sdev.iter().all(|&s| s == 0.0));
}

#[test]
fn test_statistics_need_frames() {
    let set = ramp_data_set();
    let mut session = open(&set);
    let err = frame_statistics(&mut session, &[], &NoOpReporter).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeometryError);
}

#[test]
fn test_integrate_annular_range() {
    let set = ramp_data_set();
    let mut session = open(&set);
    session.set_annular_range(AnnularRange::new(0.0, 100.0));
    let output = set.path("haadf.dat");

    let summary = integrate_annular_range(&mut session, &RunOptions::new(&output), no_op()).unwrap();
    assert_eq!(summary.frames, 6);

    let sums = read_f64_file(&output);
    let expected: Vec<f64> = (0..6).map(ramp_frame_sum).collect();
    assert_eq!(sums, expected);

    let sidecar = fs::read_to_string(set.path("haadf.dat.hdr")).unwrap();
    assert!(sidecar.contains("Number of items: 6"));
    assert!(sidecar.contains("Columns: 3"));
    assert!(sidecar.contains("Rows: 2"));
    assert!(sidecar.contains("Data float bits: 64"));
}

#[test]
fn test_integrate_over_roi() {
    let set = ramp_data_set();
    let mut session = open(&set);
    session.set_annular_range(AnnularRange::new(0.0, 100.0));
    session
        .set_scan_roi(Some(ScanRoi::new(1, 0, 2, 1).unwrap()))
        .unwrap();
    let output = set.path("roi.dat");

    integrate_annular_range(&mut session, &RunOptions::new(&output), no_op()).unwrap();
    let sums = read_f64_file(&output);
    let expected: Vec<f64> = [1, 2, 4, 5].into_iter().map(ramp_frame_sum).collect();
    assert_eq!(sums, expected);
}

#[test]
fn test_integrate_requires_enabled_range() {
    let set = ramp_data_set();
    let mut session = open(&set);
    session.set_annular_range(AnnularRange::new(5.0, 5.0));
    let output = set.path("never.dat");

    let err = integrate_annular_range(&mut session, &RunOptions::new(&output), no_op())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(!output.exists());
}

#[test]
fn test_integrate_roi_clamped_to_scan_grid() {
    let set = ramp_data_set();
    let mut session = open(&set);
    session.set_annular_range(AnnularRange::new(0.0, 100.0));
    session
        .set_scan_roi(Some(ScanRoi::new(1, 0, 5, 5).unwrap()))
        .unwrap();
    let output = set.path("clamped.dat");

    let summary = integrate_annular_range(&mut session, &RunOptions::new(&output), no_op()).unwrap();
    assert_eq!(summary.frames, 4);
    assert_eq!(read_f64_file(&output).len(), 4);

    let sidecar = fs::read_to_string(set.path("clamped.dat.hdr")).unwrap();
    assert!(sidecar.contains("Number of items: 4"));
    assert!(sidecar.contains("Columns: 2\n"));
    assert!(sidecar.contains("Rows: 2\n"));
}

#[test]
fn test_detector_runs_skip_roi_off_grid() {
    let set = ramp_data_set();
    let mut session = open(&set);
    session.set_annular_range(AnnularRange::new(0.0, 100.0));
    session
        .set_scan_roi(Some(ScanRoi::new(10, 10, 12, 12).unwrap()))
        .unwrap();

    let output = set.path("empty.dat");
    let summary = integrate_annular_range(&mut session, &RunOptions::new(&output), no_op()).unwrap();
    assert_eq!(summary.frames, 0);
    assert!(summary.outputs.is_empty());
    assert!(!output.exists());
    assert!(!set.path("empty.dat.hdr").exists());

    let output = set.path("empty_com");
    let summary = center_of_mass(&mut session, &RunOptions::new(&output), no_op()).unwrap();
    assert_eq!(summary.frames, 0);
    assert!(summary.outputs.is_empty());
    assert!(!set.path("empty_com_0-0.dat").exists());
}

#[test]
fn test_average_of_roi_off_grid_fails() {
    let set = ramp_data_set();
    let mut session = open(&set);
    session
        .set_scan_roi(Some(ScanRoi::new(10, 10, 12, 12).unwrap()))
        .unwrap();
    let output = set.path("nothing");

    let err = average_frames(&mut session, &RunOptions::new(&output), no_op()).unwrap_err();
    assert!(matches!(err, MerlinError::InvalidGeometry(_)));
    assert!(!set.path("nothing_avg.dat").exists());
}

#[test]
fn test_integrate_with_corrections() {
    let set = SyntheticDataSet::generate(4, 4, 2, 2, |_, x, y| if (x, y) == (2, 1) { 500 } else { 1 });
    let mut session = open(&set);
    session.set_annular_range(AnnularRange::new(0.0, 100.0));
    assert!(session.set_defect_pixel(2, 1).unwrap());

    let gain_path = set.path("gain.raw");
    write_f32_file(&gain_path, &[2.0; 16]);
    session.load_gain_correction(&gain_path).unwrap();

    let output = set.path("corrected.dat");
    integrate_annular_range(&mut session, &RunOptions::new(&output), no_op()).unwrap();
    assert_eq!(read_f64_file(&output), vec![32.0; 4]);

    session.unset_gain_correction();
    session.unset_defect_list();
    integrate_annular_range(&mut session, &RunOptions::new(&output), no_op()).unwrap();
    assert_eq!(read_f64_file(&output), vec![515.0; 4]);
}

#[test]
fn test_center_of_mass_outputs() {
    let set = SyntheticDataSet::generate(5, 5, 2, 2, |f, x, y| if (x, y) == (f, 2) { 8 } else { 0 });
    let mut session = open(&set);
    let mut calibration = *session.calibration();
    calibration.offset = merlin_core::geometry::PhysicalPos::new(2.0, 2.0);
    session.set_calibration(calibration);
    session.set_annular_range(AnnularRange::new(0.0, 10.0));
    let output = set.path("com");

    let summary = center_of_mass(&mut session, &RunOptions::new(&output), no_op()).unwrap();
    assert_eq!(summary.kind, RunKind::CenterOfMass);
    assert_eq!(summary.outputs.len(), 3);

    let sums = read_f64_file(&set.path("com_0-0.dat"));
    let xs = read_f64_file(&set.path("com_1-0.dat"));
    let ys = read_f64_file(&set.path("com_1-1.dat"));
    assert_eq!(sums, vec![8.0; 4]);
    assert_eq!(xs, vec![-2.0, -1.0, 0.0, 1.0]);
    assert_eq!(ys, vec![0.0; 4]);
    assert!(set.path("com_1-0.dat.hdr").is_file());
}

#[test]
fn test_center_of_mass_of_blank_frames() {
    let set = SyntheticDataSet::generate(4, 4, 2, 3, |_, _, _| 0);
    let mut session = open(&set);
    session.set_annular_range(AnnularRange::new(0.0, 100.0));
    let output = set.path("blank");

    center_of_mass(&mut session, &RunOptions::new(&output), no_op()).unwrap();
    assert_eq!(read_f64_file(&set.path("blank_1-0.dat")), vec![0.0; 6]);
    assert_eq!(read_f64_file(&set.path("blank_1-1.dat")), vec![0.0; 6]);
}

#[test]
fn test_debug_writes_detector_mask() {
    let set = ramp_data_set();
    let mut session = open(&set);
    session.set_annular_range(AnnularRange::new(0.0, 1.0));
    let output = set.path("masked.dat");
    let options = RunOptions {
        output: output.clone(),
        debug: true,
    };

    integrate_annular_range(&mut session, &options, no_op()).unwrap();
    let mask = read_f64_file(&set.path("masked.dat.det"));
    assert_eq!(mask.len(), 16);
    assert_eq!(mask[0], 1.0);
    assert_eq!(mask.iter().sum::<f64>(), 1.0);
    // Only pixel (0, 0) is inside: its value is 10 f.
    assert_eq!(read_f64_file(&output), vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
}

#[test]
fn test_session_from_config() {
    let set = ramp_data_set();
    let config = ProcessingConfig {
        input: set.base.clone(),
        output: set.path("out"),
        index: IndexMode::Scan,
        annular_range: AnnularRange::new(0.0, 100.0),
        scan_roi: Some(ScanRoi::new(0, 0, 0, 1).unwrap()),
        ..Default::default()
    };
    let mut session = Session::from_config(&config).unwrap();
    assert_eq!(session.index_mode(), IndexMode::Scan);
    assert_eq!(session.roi_frames().unwrap(), vec![0, 3]);

    let options = RunOptions::new(&config.output);
    integrate_annular_range(&mut session, &options, no_op()).unwrap();
    assert_eq!(
        read_f64_file(&config.output),
        vec![ramp_frame_sum(0), ramp_frame_sum(3)]
    );
}

#[test]
fn test_session_from_config_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let config = ProcessingConfig {
        input: dir.path().join("absent"),
        ..Default::default()
    };
    let err = Session::from_config(&config).unwrap_err();
    assert!(matches!(err, MerlinError::MissingStream(_)));
}
