//! Upload progress bar

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Progress bar drawn during the upload phase
///
/// The bar is created on [`start`](Self::start) so nothing is drawn while
/// files are still being scanned or checked. Output written inside
/// [`suspend`](Self::suspend) goes above the bar instead of tearing it.
pub struct UploadProgress {
    enabled: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl UploadProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            bar: Mutex::new(None),
        }
    }

    pub fn start(&self, total: usize) {
        if !self.enabled {
            return;
        }

        let style = ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_message("Uploading...");

        if let Some(old) = self.lock().replace(bar) {
            old.finish_and_clear();
        }
    }

    pub fn inc(&self) {
        if let Some(bar) = self.lock().as_ref() {
            bar.inc(1);
        }
    }

    /// Whether a bar is currently drawn
    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    /// Run `f` with the bar hidden
    pub fn suspend<F: FnOnce()>(&self, f: F) {
        match self.lock().as_ref() {
            Some(bar) => bar.suspend(f),
            None => f(),
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = self.lock().take() {
            bar.finish_and_clear();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|e| e.into_inner())
    }
}
