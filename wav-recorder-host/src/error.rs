use std::io;
use std::path::PathBuf;

use thiserror::Error;

use wav_recorder_core::CaptureError;

/// Errors surfaced by the `wav-record` command line.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("failed to read config {}: {source}", .path.display())]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("invalid config {}: {source}", .path.display())]
    ConfigParse { path: PathBuf, source: serde_json::Error },

    #[error("failed to open input {}: {source}", .path.display())]
    InputOpen { path: PathBuf, source: io::Error },

    #[error("failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("failed to render report: {0}")]
    Render(#[from] serde_json::Error),
}
