//! Terminal progress bars, one per file in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cloudsync_sync::FileProgress;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

#[derive(Clone, Default)]
pub struct TransferBars {
    multi: MultiProgress,
    bars: Arc<Mutex<HashMap<String, ProgressBar>>>,
}

impl TransferBars {
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{msg:30!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }

    fn update(&self, name: &str, done: u64, total: u64) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        let bar = bars.entry(name.to_string()).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new(total));
            bar.set_style(Self::style());
            bar.set_message(name.to_string());
            bar
        });
        bar.set_position(done);
        if done >= total {
            bar.finish_and_clear();
            bars.remove(name);
        }
    }

    /// Callback for the engine.
    pub fn callback(&self) -> FileProgress {
        let bars = self.clone();
        Arc::new(move |name, done, total| bars.update(name, done, total))
    }
}
