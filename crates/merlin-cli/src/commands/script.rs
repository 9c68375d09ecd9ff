use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use merlin_core::io::index::IndexMode;
use merlin_core::pipeline::Session;

use crate::script::ScriptInterpreter;

#[derive(Args)]
pub struct ScriptArgs {
    /// Data set base path (`<base>.hdr`, `<base>1.mib`, ...)
    pub file: PathBuf,

    /// Control file, one command per line. If it does not exist, commands
    /// are read from the console and recorded to it.
    pub control: PathBuf,

    /// Initial output file, replaced by `set_output_file`
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Read and verify every frame header while indexing
    #[arg(long)]
    pub scan_frame_headers: bool,

    /// Swap the byte order of multi-byte pixels
    #[arg(long)]
    pub swap_bytes: bool,

    /// Also write the detector mask to <output>.det
    #[arg(long)]
    pub debug: bool,
}

pub fn run(args: &ScriptArgs, silent: bool) -> Result<()> {
    let text = if args.control.exists() {
        let text = std::fs::read_to_string(&args.control)
            .with_context(|| format!("Failed to read control file {}", args.control.display()))?;
        if text.trim().is_empty() {
            anyhow::bail!("Empty control file {}", args.control.display());
        }
        Some(text)
    } else {
        None
    };

    let mut session = Session::new();
    if args.scan_frame_headers {
        session.set_index_mode(IndexMode::Scan);
    }
    session.set_swap_bytes(args.swap_bytes);
    session
        .load_header(&args.file)
        .with_context(|| format!("Failed to read header of {}", args.file.display()))?;
    session
        .build_frame_index()
        .with_context(|| format!("Failed to index data files of {}", args.file.display()))?;

    let mut interpreter = ScriptInterpreter::new(session, silent);
    interpreter.set_debug(args.debug);
    if let Some(ref output) = args.output {
        interpreter.set_output(output.clone());
    }

    let report = match text {
        Some(text) => {
            if !silent {
                println!("Running control file: {}", args.control.display());
            }
            interpreter.run(&text)
        }
        None => {
            let file = File::create(&args.control).with_context(|| {
                format!("Failed to create control file {}", args.control.display())
            })?;
            if !silent {
                println!("Interactive control input, recording to {}", args.control.display());
            }
            let mut record = BufWriter::new(file);
            interpreter.run_interactive(io::stdin().lock(), &mut record)?
        }
    };
    if !silent {
        println!(
            "Control input done: {} command(s), {} failed, {} unknown",
            report.executed, report.failed, report.unknown
        );
    }
    Ok(())
}
