//! Output configuration and formatting

mod formatter;
mod progress;

pub use formatter::Formatter;
pub use progress::UploadProgress;

/// Output settings shared by all commands
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Emit JSON instead of human-readable text
    pub json: bool,
    pub no_color: bool,
    pub no_progress: bool,
    /// Suppress everything but errors
    pub quiet: bool,
}

impl OutputConfig {
    /// Whether an interactive progress bar should be drawn
    pub fn show_progress(&self) -> bool {
        !self.json && !self.quiet && !self.no_progress
    }
}
