use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingMetadata;
use crate::traits::block_storage::{BlockStorage, StorageHandle};

/// Sidecar path for a recording: `{stem}.metadata.json` in the same directory.
pub fn metadata_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

/// Write recording metadata as a JSON sidecar on the recording's volume.
pub fn write_metadata<S: BlockStorage>(
    storage: &mut S,
    metadata: &RecordingMetadata,
    recording_path: &Path,
) -> Result<(), CaptureError> {
    let json = serde_json::to_vec_pretty(metadata)
        .map_err(|e| CaptureError::StorageWrite(format!("failed to serialize metadata: {}", e)))?;

    let mut handle = storage.create(&metadata_path(recording_path))?;
    handle
        .write_all(&json)
        .map_err(|e| CaptureError::StorageWrite(format!("failed to write metadata: {}", e)))?;
    handle
        .flush()
        .and_then(|_| handle.sync())
        .map_err(|e| CaptureError::StorageSync(format!("failed to sync metadata: {}", e)))?;
    Ok(())
}

/// Read recording metadata from a JSON sidecar on the host filesystem.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, CaptureError> {
    let metadata_path = metadata_path(recording_path);
    let json = fs::read_to_string(&metadata_path)
        .map_err(|e| CaptureError::FileOpen(format!("failed to read metadata: {}", e)))?;
    let metadata: RecordingMetadata = serde_json::from_str(&json)
        .map_err(|e| CaptureError::InvalidFormat(format!("failed to parse metadata: {}", e)))?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::ChunkingMode;
    use crate::models::recording_result::StopReason;
    use crate::processing::wav_format;
    use crate::storage::fs_storage::FsStorage;

    #[test]
    fn sidecar_sits_next_to_recording() {
        assert_eq!(
            metadata_path(Path::new("/sdcard/audio.wav")),
            PathBuf::from("/sdcard/audio.metadata.json")
        );
    }

    #[test]
    fn written_metadata_reads_back() {
        let root = std::env::temp_dir().join("wav_recorder_metadata_test");
        let mut storage = FsStorage::new(&root).create_root(true);
        storage.mount().unwrap();

        let header = wav_format::build_header(2, 16000, 16).unwrap().resized(44 + 64, 64).unwrap();
        let metadata = RecordingMetadata::new(
            "take.wav",
            &header,
            ChunkingMode::Single,
            108,
            1,
            "00",
            StopReason::Cancelled,
        );
        write_metadata(&mut storage, &metadata, Path::new("take.wav")).unwrap();

        let read = read_metadata(&root.join("take.wav")).unwrap();
        assert_eq!(read, metadata);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn missing_sidecar_is_a_file_open_error() {
        let path = std::env::temp_dir().join("wav_recorder_no_such_recording.wav");
        assert!(matches!(read_metadata(&path), Err(CaptureError::FileOpen(_))));
    }
}
