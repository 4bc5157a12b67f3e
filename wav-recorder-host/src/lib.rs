//! # wav-recorder-host
//!
//! Desktop audio sources and the `wav-record` command line for
//! wav-recorder-core.
//!
//! Provides:
//! - `StreamSource`: raw PCM from stdin, a file, or any `Read` stream
//! - `ToneSource`: synthetic sine tone, optionally paced in real time
//! - `cli` / `commands`: the `record` and `inspect` subcommands
//!
//! ## Usage
//! ```ignore
//! use wav_recorder_core::{CaptureLoop, FsStorage, RecordingConfiguration, StopHandle};
//! use wav_recorder_host::StreamSource;
//!
//! let stop = StopHandle::new();
//! let source = StreamSource::new("stdin", std::io::stdin(), 2048).stop_at_end(stop.clone());
//! let storage = FsStorage::new("/sdcard");
//! let mut session = CaptureLoop::new(source, storage, RecordingConfiguration::default()).with_stop_handle(stop);
//! let result = session.run()?;
//! ```

pub mod cli;
pub mod commands;
pub mod error;
pub mod stream_source;
pub mod tone_source;

pub use error::CliError;
pub use stream_source::StreamSource;
pub use tone_source::ToneSource;
