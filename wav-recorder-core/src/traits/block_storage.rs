use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;

/// An open file on a [`BlockStorage`] volume.
///
/// `flush` (from [`Write`]) empties in-process buffers; `sync` must also
/// force the data to stable storage before returning.
pub trait StorageHandle: Write + Seek + Send {
    fn sync(&mut self) -> io::Result<()>;
}

/// Storage volume the recording is persisted to.
pub trait BlockStorage: Send {
    type Handle: StorageHandle;

    /// Make the volume available. Failure aborts the session before capture starts.
    fn mount(&mut self) -> Result<(), CaptureError>;

    /// Create `path` (truncating any existing file) for writing.
    fn create(&mut self, path: &Path) -> Result<Self::Handle, CaptureError>;

    /// Release the volume. Handles must already be closed.
    fn unmount(&mut self) -> Result<(), CaptureError>;

    /// Where `path` lives on this volume, for logs and results.
    fn resolve(&self, path: &Path) -> PathBuf;
}
