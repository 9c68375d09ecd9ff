use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::io::raw_writer::{write_sidecar, RawArrayWriter, SidecarInfo};

use super::session::Session;
use super::types::{ProcessingStage, ProgressReporter, RunKind, RunOptions, RunSummary};

/// Copy the raw payload of every ROI frame, in global frame order, to
/// `options.output` and describe it in `<output>.hdr`.
///
/// Frames are streamed to disk as they are read. If a frame fails, the frames
/// written so far stay in the output and no sidecar is written.
pub fn extract_frames(
    session: &Session,
    options: &RunOptions,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<RunSummary> {
    let frames = session.roi_frames()?;
    let template = session.template()?;
    let mut writer = RawArrayWriter::create(&options.output)?;
    let mut reader = session.frame_reader()?;

    reporter.begin_stage(ProcessingStage::Extracting, Some(frames.len()));
    for (done, &frame) in frames.iter().enumerate() {
        let raw = reader.read_raw(frame)?;
        writer.write_block(&raw)?;
        reporter.advance(done + 1);
    }
    reporter.finish_stage();

    let written = writer.items_written();
    let file_name = writer.path().display().to_string();
    writer.finalize()?;
    write_sidecar(
        &options.output,
        &SidecarInfo::Frames {
            file_name: file_name.clone(),
            frames: written,
            columns: template.columns,
            rows: template.rows,
            bits: template.bits_per_pixel,
        },
    )?;
    info!(
        file = %file_name,
        frames = written,
        bits = template.bits_per_pixel,
        "Frames extracted"
    );

    Ok(RunSummary {
        kind: RunKind::Extract,
        frames: written,
        roi: session.scan_roi(),
        outputs: vec![options.output.clone()],
    })
}
