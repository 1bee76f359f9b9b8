use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

/// Progress bar for the update check, or structured log lines when not on a terminal
pub struct ScanUi {
    bar: Option<ProgressBar>,
}

impl ScanUi {
    pub fn new(show: bool) -> Self {
        if !show || !is_interactive() {
            tracing::info!(operation = "ui_init", mode = "non_interactive", "Progress bar disabled");
            return Self { bar: None };
        }

        let bar = ProgressBar::new(0);
        // A bad template only loses styling, the bar still works
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        bar.set_message("Checking titles...");
        Self { bar: Some(bar) }
    }

    pub fn update(&self, done: usize, total: usize, title: &str) {
        match &self.bar {
            Some(bar) => {
                bar.set_length(total as u64);
                bar.set_position(done as u64);
                bar.set_message(title.to_string());
            }
            None => tracing::debug!(operation = "progress", current = done, total, title, "Checked title"),
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

pub fn is_interactive() -> bool {
    std::io::stdout().is_terminal() && std::io::stderr().is_terminal()
}
