//! # wav-recorder-core
//!
//! Crash-consistent incremental WAV recording.
//!
//! Captures raw PCM from an [`AudioSource`] and appends it to a WAV file on a
//! [`BlockStorage`] volume, rewriting the header and syncing after every
//! frame so the file on stable storage is always complete and parseable.
//!
//! ## Architecture
//!
//! ```text
//! wav-recorder-core (this crate)
//! ├── traits/       ← AudioSource, BlockStorage, StorageHandle, CaptureDelegate
//! ├── models/       ← CaptureError, CaptureState, RecordingConfiguration, RecordingResult
//! ├── processing/   ← WAV header codec
//! ├── storage/      ← IncrementalFileWriter, FsStorage, MemoryStorage, metadata, inspection
//! └── session/      ← CaptureLoop (capture/termination state machine)
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::{ChunkingMode, ReadErrorPolicy, RecordingConfiguration};
pub use models::error::CaptureError;
pub use models::recording_result::{RecordingMetadata, RecordingResult, StopReason};
pub use models::state::CaptureState;
pub use processing::wav_format::WaveHeader;
pub use session::capture_loop::{CaptureLoop, SessionMonitor, SessionSnapshot, StopHandle};
pub use storage::fs_storage::FsStorage;
pub use storage::incremental_writer::{IncrementalFileWriter, WriterSummary};
pub use storage::inspect::{inspect_file, DataLayout, FileReport};
pub use storage::memory::MemoryStorage;
pub use traits::audio_source::{AudioRead, AudioSource};
pub use traits::block_storage::{BlockStorage, StorageHandle};
pub use traits::capture_delegate::{CaptureDelegate, FrameProgress};
