//! Line-oriented control-script interpreter.
//!
//! Each line holds one command. Commands that take a parameter read it from
//! the following line. Command names are case-insensitive; blank lines are
//! skipped. An unknown or failing command is reported and the script carries
//! on with the next line; `exit` or `quit` stops it.
//!
//! The same commands can be typed at a console prompt. Accepted console lines
//! are recorded so the session can be replayed as a control file.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use merlin_core::pipeline::{ProgressReporter, RunKind, RunOptions, Session};
use tracing::{debug, error, info};

use crate::commands::run::{execute, reporter};
use crate::params;
use crate::summary;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    SetScanRectRoi,
    SetOrigin,
    SetSampling,
    SetAnnularRange,
    SetOutputFile,
    SetDefectMask,
    SetDefectList,
    SetDefectPixel,
    UnsetDefectPixel,
    UnsetDefectList,
    SetGainCorrection,
    UnsetGainCorrection,
    Run(RunKind),
    Exit,
}

impl Command {
    pub fn parse(name: &str) -> Option<Self> {
        let command = match name.trim().to_ascii_lowercase().as_str() {
            "set_scan_rect_roi" => Self::SetScanRectRoi,
            "set_origin" => Self::SetOrigin,
            "set_sampling" => Self::SetSampling,
            "set_annular_range" => Self::SetAnnularRange,
            "set_output_file" => Self::SetOutputFile,
            "set_defect_mask" => Self::SetDefectMask,
            "set_defect_list" => Self::SetDefectList,
            "set_defect_pixel" => Self::SetDefectPixel,
            "unset_defect_pixel" => Self::UnsetDefectPixel,
            "unset_defect_list" => Self::UnsetDefectList,
            "set_gain_correction" => Self::SetGainCorrection,
            "unset_gain_correction" => Self::UnsetGainCorrection,
            "extract_frames" => Self::Run(RunKind::Extract),
            "average_frames" => Self::Run(RunKind::Average),
            "integrate_annular_range" => Self::Run(RunKind::Integrate),
            "center_of_mass" => Self::Run(RunKind::CenterOfMass),
            "exit" | "quit" => Self::Exit,
            _ => return None,
        };
        Some(command)
    }

    pub fn takes_param(self) -> bool {
        !matches!(
            self,
            Self::UnsetDefectList | Self::UnsetGainCorrection | Self::Run(_) | Self::Exit
        )
    }
}

/// Counts of a finished script.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScriptReport {
    pub executed: usize,
    pub failed: usize,
    pub unknown: usize,
}

/// Where command and parameter lines come from.
trait LineSource {
    /// Next line, `None` at end of input. `context` names the command whose
    /// parameter is requested, empty for a command line.
    fn next_line(&mut self, context: &str) -> Option<String>;
}

struct ScriptLines<'a>(std::str::Lines<'a>);

impl LineSource for ScriptLines<'_> {
    fn next_line(&mut self, _context: &str) -> Option<String> {
        self.0
            .next()
            .map(|line| line.trim_end_matches('\r').to_string())
    }
}

/// Console input with a `> ` prompt.
struct ConsoleLines<R> {
    input: R,
    prompt: bool,
}

impl<R: BufRead> LineSource for ConsoleLines<R> {
    fn next_line(&mut self, context: &str) -> Option<String> {
        if self.prompt {
            print!("{context} > ");
            let _ = io::stdout().flush();
        }
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

pub struct ScriptInterpreter {
    session: Session,
    output: Option<PathBuf>,
    debug: bool,
    silent: bool,
    reporter: Arc<dyn ProgressReporter>,
}

impl ScriptInterpreter {
    pub fn new(session: Session, silent: bool) -> Self {
        Self {
            session,
            output: None,
            debug: false,
            silent,
            reporter: reporter(silent),
        }
    }

    pub fn set_output(&mut self, output: PathBuf) {
        self.output = Some(output);
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn output(&self) -> Option<&PathBuf> {
        self.output.as_ref()
    }

    /// Execute every command of `text`.
    pub fn run(&mut self, text: &str) -> ScriptReport {
        let mut discard = io::sink();
        let result = self.run_lines(&mut ScriptLines(text.lines()), &mut discard);
        // Writes to a sink never fail.
        result.unwrap_or_default()
    }

    /// Read commands from `input` until end of input or `exit`.
    ///
    /// Every accepted command and its parameter line are appended to `record`,
    /// one per line, in control-file form.
    pub fn run_interactive<R: BufRead, W: Write>(
        &mut self,
        input: R,
        record: &mut W,
    ) -> Result<ScriptReport> {
        let mut source = ConsoleLines {
            input,
            prompt: !self.silent,
        };
        self.run_lines(&mut source, record)
    }

    fn run_lines<S: LineSource, W: Write>(
        &mut self,
        source: &mut S,
        record: &mut W,
    ) -> Result<ScriptReport> {
        let mut report = ScriptReport::default();

        while let Some(line) = source.next_line("") {
            let name = line.trim();
            if name.is_empty() {
                continue;
            }
            let Some(command) = Command::parse(name) else {
                eprintln!("Unknown or invalid command: {name}");
                report.unknown += 1;
                continue;
            };
            debug!(command = name, "Control command");
            writeln!(record, "{name}").context("Failed to record command")?;
            if command == Command::Exit {
                if !self.silent {
                    println!("Exiting control input.");
                }
                break;
            }

            let param = if command.takes_param() {
                match source.next_line(name) {
                    Some(param) => {
                        writeln!(record, "{param}").context("Failed to record parameter")?;
                        Some(param)
                    }
                    None => {
                        eprintln!("Error while processing command: {name}: missing parameter line");
                        report.failed += 1;
                        break;
                    }
                }
            } else {
                None
            };

            report.executed += 1;
            if let Err(e) = self.dispatch(command, param.as_deref().unwrap_or("")) {
                error!(command = name, error = %e, "Control command failed");
                eprintln!("Error while processing command: {name}: {e:#}");
                report.failed += 1;
            }
        }
        record.flush().context("Failed to record commands")?;
        Ok(report)
    }

    fn dispatch(&mut self, command: Command, param: &str) -> Result<()> {
        let session = &mut self.session;
        match command {
            Command::SetScanRectRoi => session.set_scan_roi(Some(params::parse_roi(param)?))?,
            Command::SetOrigin => {
                let mut calibration = *session.calibration();
                calibration.offset = params::parse_origin(param)?;
                session.set_calibration(calibration);
            }
            Command::SetSampling => {
                let mut calibration = *session.calibration();
                params::apply_sampling(&mut calibration, param)?;
                session.set_calibration(calibration);
            }
            Command::SetAnnularRange => session.set_annular_range(params::parse_range(param)?),
            Command::SetOutputFile => {
                let path = param.trim();
                if path.is_empty() {
                    return Err(anyhow!("empty output file name"));
                }
                self.output = Some(PathBuf::from(path));
            }
            Command::SetDefectMask => {
                session.load_defect_mask(param.trim().as_ref())?;
            }
            Command::SetDefectList => {
                session.load_defect_list(param.trim().as_ref())?;
            }
            Command::SetDefectPixel => {
                let (x, y) = params::parse_pixel(param)?;
                session.set_defect_pixel(x, y)?;
            }
            Command::UnsetDefectPixel => {
                let (x, y) = params::parse_pixel(param)?;
                session.unset_defect_pixel(x, y)?;
            }
            Command::UnsetDefectList => session.unset_defect_list(),
            Command::SetGainCorrection => session.load_gain_correction(param.trim().as_ref())?,
            Command::UnsetGainCorrection => session.unset_gain_correction(),
            Command::Run(kind) => self.run_processing(kind)?,
            Command::Exit => {}
        }
        Ok(())
    }

    fn run_processing(&mut self, kind: RunKind) -> Result<()> {
        let output = self
            .output
            .clone()
            .ok_or_else(|| anyhow!("no output file set, use set_output_file"))?;
        let options = RunOptions {
            output,
            debug: self.debug,
        };
        let result = execute(&mut self.session, kind, &options, self.reporter.clone())
            .with_context(|| format!("{kind} failed"))?;
        info!(run = %kind, frames = result.frames, "Control run finished");
        if !self.silent {
            summary::print_result(&result);
        }
        Ok(())
    }
}
