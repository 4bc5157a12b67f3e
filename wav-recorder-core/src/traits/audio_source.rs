use std::time::Duration;

use crate::models::error::CaptureError;

/// Outcome of one blocking read from an [`AudioSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioRead {
    /// `n` bytes of PCM were copied into the front of the buffer.
    Data(usize),
    /// Nothing arrived within the timeout.
    Timeout,
    /// The device reported a read failure.
    Error(String),
}

/// Capture device delivering raw interleaved PCM bytes.
///
/// The capture loop owns the source exclusively for the whole session and
/// drives it from a single thread: `start`, then repeated `read`, then `stop`.
pub trait AudioSource: Send {
    /// Bring the device up. Failure aborts the session before capture starts.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Block for at most `timeout` waiting for samples and copy up to
    /// `buffer.len()` bytes into `buffer`.
    fn read(&mut self, buffer: &mut [u8], timeout: Duration) -> AudioRead;

    /// Release the device.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Human-readable device description for logs and metadata.
    fn describe(&self) -> String;
}
