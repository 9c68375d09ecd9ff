use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use merlin_core::error::Result as CoreResult;
use merlin_core::io::index::IndexMode;
use merlin_core::pipeline::config::ProcessingConfig;
use merlin_core::pipeline::{
    average_frames, center_of_mass, extract_frames, integrate_annular_range, NoOpReporter,
    ProgressReporter, RunKind, RunOptions, RunSummary, Session,
};

use crate::params;
use crate::progress::BarReporter;
use crate::summary;

#[derive(Args)]
pub struct RunArgs {
    /// Data set base path (`<base>.hdr`, `<base>1.mib`, ...)
    pub file: PathBuf,

    /// Output file (extract, integrate) or output base name (average, com)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Processing config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Read and verify every frame header while indexing
    #[arg(long)]
    pub scan_frame_headers: bool,

    /// Swap the byte order of multi-byte pixels
    #[arg(long)]
    pub swap_bytes: bool,

    /// Scan region of interest: x0,y0,x1,y1 (inclusive)
    #[arg(long)]
    pub roi: Option<String>,

    /// Detector origin in frame pixels: x,y
    #[arg(long)]
    pub origin: Option<String>,

    /// Detector sampling: a0x,a1x,a0y,a1y
    #[arg(long)]
    pub sampling: Option<String>,

    /// Annular detector range: min,max
    #[arg(long)]
    pub range: Option<String>,

    /// Defect mask file (raw 32-bit integers)
    #[arg(long)]
    pub defect_mask: Option<PathBuf>,

    /// Defect list file (one x,y per line)
    #[arg(long)]
    pub defect_list: Option<PathBuf>,

    /// Gain correction file (raw 32-bit floats)
    #[arg(long)]
    pub gain: Option<PathBuf>,

    /// Also write the detector mask to <output>.det
    #[arg(long)]
    pub debug: bool,
}

/// Config from `--config` (if any) with the command-line flags applied on top.
fn build_config(args: &RunArgs) -> Result<ProcessingConfig> {
    let mut config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid processing config")?
    } else {
        ProcessingConfig::default()
    };

    config.input = args.file.clone();
    if let Some(ref output) = args.output {
        config.output = output.clone();
    }
    if args.scan_frame_headers {
        config.index = IndexMode::Scan;
    }
    if args.swap_bytes {
        config.swap_bytes = true;
    }
    if let Some(ref roi) = args.roi {
        config.scan_roi = Some(params::parse_roi(roi).context("Invalid --roi")?);
    }
    if let Some(ref origin) = args.origin {
        config.calibration.offset = params::parse_origin(origin).context("Invalid --origin")?;
    }
    if let Some(ref sampling) = args.sampling {
        params::apply_sampling(&mut config.calibration, sampling).context("Invalid --sampling")?;
    }
    if let Some(ref range) = args.range {
        config.annular_range = params::parse_range(range).context("Invalid --range")?;
    }
    if let Some(ref path) = args.defect_mask {
        config.corrections.defect_mask = Some(path.clone());
    }
    if let Some(ref path) = args.defect_list {
        config.corrections.defect_list = Some(path.clone());
    }
    if let Some(ref path) = args.gain {
        config.corrections.gain_correction = Some(path.clone());
    }
    Ok(config)
}

/// Progress bars unless the console is silenced.
pub fn reporter(silent: bool) -> Arc<dyn ProgressReporter> {
    if silent {
        Arc::new(NoOpReporter)
    } else {
        Arc::new(BarReporter::default())
    }
}

/// Dispatch one run on an open session.
pub fn execute(
    session: &mut Session,
    kind: RunKind,
    options: &RunOptions,
    reporter: Arc<dyn ProgressReporter>,
) -> CoreResult<RunSummary> {
    match kind {
        RunKind::Extract => extract_frames(session, options, reporter),
        RunKind::Average => average_frames(session, options, reporter),
        RunKind::Integrate => integrate_annular_range(session, options, reporter),
        RunKind::CenterOfMass => center_of_mass(session, options, reporter),
    }
}

pub fn run(args: &RunArgs, kind: RunKind, silent: bool) -> Result<()> {
    let config = build_config(args)?;
    if !silent {
        summary::print_run_summary(&config, kind);
    }

    let mut session = Session::from_config(&config)
        .with_context(|| format!("Failed to prepare data set {}", config.input.display()))?;
    let options = RunOptions {
        output: config.output.clone(),
        debug: args.debug,
    };

    let result = execute(&mut session, kind, &options, reporter(silent))
        .map_err(|e| {
            let kind_label = e.kind();
            anyhow::Error::new(e).context(format!("{kind} failed ({kind_label})"))
        })?;

    if !silent {
        summary::print_result(&result);
    }
    Ok(())
}
