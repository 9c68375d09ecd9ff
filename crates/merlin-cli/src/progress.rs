use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use merlin_core::pipeline::{ProcessingStage, ProgressReporter};

/// Drives one indicatif progress bar per processing stage.
#[derive(Default)]
pub struct BarReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarReporter {
    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: ProcessingStage, total_items: Option<usize>) {
        let bar = match total_items {
            Some(total) => {
                let bar = ProgressBar::new(total as u64);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{msg:28} [{bar:40}] {pos}/{len}")
                {
                    bar.set_style(style.progress_chars("=> "));
                }
                bar
            }
            None => ProgressBar::new_spinner(),
        };
        bar.set_message(stage.to_string());
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(bar);
        }
    }

    fn advance(&self, items_done: usize) {
        self.with_bar(|bar| {
            if items_done as u64 > bar.position() {
                bar.set_position(items_done as u64);
            }
        });
    }

    fn finish_stage(&self) {
        self.with_bar(|bar| bar.finish());
    }
}
