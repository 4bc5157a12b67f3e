use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::ChunkingMode;
use crate::processing::wav_format::WaveHeader;

/// Why a session left the capturing state without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The configured payload budget was reached.
    ByteBudget,
    /// A stop was requested through the session's stop handle.
    Cancelled,
}

/// Result returned when a capture session closes cleanly.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub payload_bytes: u64,
    pub total_bytes: u64,
    pub frames_appended: u64,
    pub duration_secs: f64,
    /// SHA-256 of the payload bytes, lowercase hex.
    pub checksum: String,
    pub stop_reason: StopReason,
    pub metadata: RecordingMetadata,
}

/// Metadata written as a JSON sidecar next to a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub file_path: String,
    pub created_at: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub chunking_mode: ChunkingMode,
    pub payload_bytes: u64,
    pub total_bytes: u64,
    pub frames_appended: u64,
    pub duration_secs: f64,
    pub checksum: String,
    pub stop_reason: StopReason,
}

impl RecordingMetadata {
    pub fn new(
        file_path: &str,
        header: &WaveHeader,
        chunking_mode: ChunkingMode,
        total_bytes: u64,
        frames_appended: u64,
        checksum: &str,
        stop_reason: StopReason,
    ) -> Self {
        let payload_bytes = header.data_bytes as u64;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_path: file_path.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            sample_rate: header.sample_rate,
            channels: header.channels,
            bit_depth: header.bit_depth,
            chunking_mode,
            payload_bytes,
            total_bytes,
            frames_appended,
            duration_secs: payload_duration_secs(header, payload_bytes),
            checksum: checksum.to_string(),
            stop_reason,
        }
    }
}

/// Seconds of audio in `payload_bytes` at the header's byte rate.
pub fn payload_duration_secs(header: &WaveHeader, payload_bytes: u64) -> f64 {
    if header.byte_rate == 0 {
        return 0.0;
    }
    payload_bytes as f64 / header.byte_rate as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::wav_format;
    use approx::assert_relative_eq;

    #[test]
    fn duration_follows_byte_rate() {
        let header = wav_format::build_header(2, 16000, 16).unwrap();
        assert_relative_eq!(payload_duration_secs(&header, 64000), 1.0);
        assert_relative_eq!(payload_duration_secs(&header, 5120), 0.08);
    }

    #[test]
    fn metadata_round_trips_through_json() {
        let header = wav_format::build_header(1, 44100, 16)
            .unwrap()
            .resized(44 + 88200, 88200)
            .unwrap();
        let metadata = RecordingMetadata::new(
            "/sdcard/audio.wav",
            &header,
            ChunkingMode::Single,
            44 + 88200,
            44,
            "abc123",
            StopReason::ByteBudget,
        );

        assert_relative_eq!(metadata.duration_secs, 1.0);
        assert!(!metadata.id.is_empty());

        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains("\"stop_reason\":\"byte_budget\""));
        let parsed: RecordingMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, metadata);
    }
}
