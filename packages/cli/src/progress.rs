//! Terminal output: the logger bridge and the refresh countdown bar.
//!
//! Log lines are routed through `indicatif-log-bridge` so they are
//! suspended while the countdown bar redraws.

use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Initializes `pretty_env_logger` from `RUST_LOG`, wrapped so it cooperates
/// with the returned [`MultiProgress`].
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}

/// Prints `text` above any bars without tearing them.
pub fn print(multi: &MultiProgress, text: &str) {
    multi.suspend(|| println!("{text}"));
}

/// Fills up as the next flood-risk refresh approaches.
pub struct CountdownBar {
    bar: ProgressBar,
    cadence: u64,
}

impl CountdownBar {
    #[must_use]
    pub fn new(multi: &MultiProgress, cadence: Duration) -> Self {
        let cadence = cadence.as_secs();
        let bar = multi.add(ProgressBar::new(cadence));
        bar.set_style(
            ProgressStyle::with_template("{prefix:.bold} {wide_bar:.cyan/dim} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        bar.set_prefix("next refresh");
        bar.set_message(format!("{cadence}s"));

        Self { bar, cadence }
    }

    pub fn update(&self, seconds_remaining: u64, visible: bool) {
        self.bar
            .set_position(self.cadence.saturating_sub(seconds_remaining));
        if visible {
            self.bar.set_prefix("next refresh");
            self.bar.set_message(format!("{seconds_remaining}s"));
        } else {
            self.bar.set_prefix("paused");
            self.bar.set_message("view hidden");
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
