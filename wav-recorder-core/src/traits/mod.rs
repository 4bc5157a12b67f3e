pub mod audio_source;
pub mod block_storage;
pub mod capture_delegate;
