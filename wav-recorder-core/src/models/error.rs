use thiserror::Error;

/// Errors that can occur while building, writing, or driving a recording.
///
/// Payloads are strings so the error stays `Clone` and can be stored in
/// [`CaptureState`](super::state::CaptureState) and handed to delegates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("audio device initialization failed: {0}")]
    DeviceInit(String),

    #[error("storage volume unavailable: {0}")]
    StorageMount(String),

    #[error("failed to open output file: {0}")]
    FileOpen(String),

    #[error("invalid audio format: {0}")]
    InvalidFormat(String),

    #[error("audio read timed out")]
    AudioReadTimeout,

    #[error("audio read failed: {0}")]
    AudioRead(String),

    #[error("storage write failed: {0}")]
    StorageWrite(String),

    #[error("storage sync failed: {0}")]
    StorageSync(String),

    #[error("recording exceeds the RIFF size limit: {0}")]
    FileTooLarge(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),
}

impl CaptureError {
    /// Whether this error ends the session.
    ///
    /// Read timeouts and device read errors are retried by the capture loop;
    /// everything else aborts it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::AudioReadTimeout | Self::AudioRead(_))
    }
}
