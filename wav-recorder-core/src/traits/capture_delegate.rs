use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::CaptureState;

/// Progress after one successful append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameProgress {
    pub frame_bytes: usize,
    pub frames_appended: u64,
    pub payload_bytes: u64,
    pub total_bytes: u64,
}

/// Event delegate for capture session notifications.
///
/// All methods are called from the thread running the capture loop, between
/// storage operations. Keep them short; a slow delegate delays the next read.
pub trait CaptureDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &CaptureState);

    /// Called after every frame is appended and synced.
    fn on_frame_appended(&self, _progress: &FrameProgress) {}

    /// Called for every error, transient or fatal.
    fn on_error(&self, error: &CaptureError);

    /// Called when the session closes cleanly and the file is finalized.
    fn on_capture_finished(&self, result: &RecordingResult);
}
