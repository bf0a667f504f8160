use std::sync::atomic::{AtomicUsize, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use t2map_core::pipeline::{PipelineStage, ProgressReporter};

/// Progress reporter backed by a terminal progress bar (0-100%).
pub struct BarReporter {
    bar: ProgressBar,
    current_total: AtomicUsize,
}

impl BarReporter {
    pub fn new() -> anyhow::Result<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:20} [{bar:40}] {pos}%")?
                .progress_chars("=> "),
        );
        Ok(Self {
            bar,
            current_total: AtomicUsize::new(0),
        })
    }

    pub fn finish(&self, msg: &'static str) {
        self.bar.finish_with_message(msg);
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: PipelineStage, total_items: Option<usize>) {
        self.current_total
            .store(total_items.unwrap_or(0), Ordering::Relaxed);
        self.bar.set_message(stage.to_string());
        self.bar.set_position(0);
    }

    fn advance(&self, items_done: usize) {
        let total = self.current_total.load(Ordering::Relaxed);
        if total > 0 {
            self.bar.set_position((items_done * 100 / total) as u64);
        }
    }

    fn finish_stage(&self) {
        self.bar.set_position(100);
    }
}
