use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::error::CaptureError;
use crate::processing::wav_format::{self, WaveHeader};

/// How appended frames are framed inside the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingMode {
    /// One growing `data` chunk. Every standard decoder reads the result.
    #[default]
    Single,

    /// An 8-byte `data` sub-chunk header before every frame.
    ///
    /// Non-conformant: the extra headers sit inside what decoders treat as
    /// one contiguous data region and are played back as samples. Only for
    /// consumers that expect this legacy layout.
    PerFrame,
}

/// What the capture loop does when the audio device reports a read error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadErrorPolicy {
    /// Log and keep reading.
    #[default]
    Continue,

    /// End the session after this many read errors in a row.
    FailAfter { consecutive: u32 },
}

/// Configuration for a recording session. Immutable once recording starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfiguration {
    /// Sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Bit depth of the PCM samples (default: 16). Valid values: 8, 16, 24, 32.
    pub bit_depth: u16,

    /// Number of channels (default: 2). Valid values: 1, 2.
    pub channels: u16,

    /// Output file, relative to the storage root when not absolute.
    pub output_path: PathBuf,

    /// Stop once this many payload bytes have been appended (default: 2 MiB).
    pub max_payload_bytes: Option<u64>,

    /// Stop once this much audio has been appended (None = unlimited).
    pub max_duration_secs: Option<f64>,

    pub chunking_mode: ChunkingMode,

    /// Largest frame requested from the audio source per read (default: 2048).
    pub frame_bytes: usize,

    /// Upper bound on a single audio read (default: 100 ms).
    pub read_timeout_ms: u64,

    pub read_error_policy: ReadErrorPolicy,

    /// Write a JSON metadata sidecar next to the recording on clean close.
    pub write_metadata: bool,
}

impl RecordingConfiguration {
    pub fn validate(&self) -> Result<(), CaptureError> {
        self.wave_header()?;

        if self.output_path.as_os_str().is_empty() {
            return Err(CaptureError::ConfigurationFailed("output path is empty".into()));
        }
        if self.frame_bytes == 0 {
            return Err(CaptureError::ConfigurationFailed("frame size must be positive".into()));
        }
        if u32::try_from(self.frame_bytes).is_err() {
            return Err(CaptureError::ConfigurationFailed(format!(
                "frame size {} does not fit a RIFF chunk",
                self.frame_bytes
            )));
        }
        if self.read_timeout_ms == 0 {
            return Err(CaptureError::ConfigurationFailed("read timeout must be positive".into()));
        }
        if self.max_payload_bytes == Some(0) {
            return Err(CaptureError::ConfigurationFailed("payload budget must be positive".into()));
        }
        if let Some(secs) = self.max_duration_secs {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(CaptureError::ConfigurationFailed(format!("invalid duration bound: {}", secs)));
            }
        }
        if let ReadErrorPolicy::FailAfter { consecutive: 0 } = self.read_error_policy {
            return Err(CaptureError::ConfigurationFailed(
                "read error threshold must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Session header with no payload, validated against the supported formats.
    pub fn wave_header(&self) -> Result<WaveHeader, CaptureError> {
        wav_format::build_header(self.channels, self.sample_rate, self.bit_depth)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Payload byte count at which the session stops, if bounded.
    ///
    /// The smaller of the byte budget and the duration bound, the latter
    /// rounded up to a whole sample frame.
    pub fn payload_budget(&self) -> Result<Option<u64>, CaptureError> {
        let header = self.wave_header()?;
        let from_duration = self.max_duration_secs.and_then(|secs| {
            let bytes = (secs * header.byte_rate as f64).ceil() as u64;
            let align = header.block_align as u64;
            // A duration past u64::MAX bytes bounds nothing.
            bytes.div_ceil(align).checked_mul(align)
        });

        Ok(match (self.max_payload_bytes, from_duration) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        })
    }
}

impl Default for RecordingConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            bit_depth: 16,
            channels: 2,
            output_path: PathBuf::from("audio.wav"),
            max_payload_bytes: Some(2 * 1024 * 1024),
            max_duration_secs: None,
            chunking_mode: ChunkingMode::Single,
            frame_bytes: 2048,
            read_timeout_ms: 100,
            read_error_policy: ReadErrorPolicy::Continue,
            write_metadata: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_is_valid() {
        let config = RecordingConfiguration::default();
        config.validate().unwrap();
        assert_eq!(config.payload_budget().unwrap(), Some(2_097_152));
        assert_eq!(config.read_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn rejects_unsupported_format() {
        let config = RecordingConfiguration {
            bit_depth: 12,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CaptureError::InvalidFormat(_))));
    }

    #[test]
    fn rejects_degenerate_loop_settings() {
        let cases = [
            RecordingConfiguration {
                frame_bytes: 0,
                ..Default::default()
            },
            RecordingConfiguration {
                read_timeout_ms: 0,
                ..Default::default()
            },
            RecordingConfiguration {
                max_payload_bytes: Some(0),
                ..Default::default()
            },
            RecordingConfiguration {
                max_duration_secs: Some(-1.0),
                ..Default::default()
            },
            RecordingConfiguration {
                read_error_policy: ReadErrorPolicy::FailAfter { consecutive: 0 },
                ..Default::default()
            },
            RecordingConfiguration {
                output_path: PathBuf::new(),
                ..Default::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(CaptureError::ConfigurationFailed(_))),
                "{:?} should be rejected",
                config
            );
        }
    }

    #[test]
    fn duration_bound_rounds_up_to_whole_frames() {
        // 16 kHz stereo 16-bit: 64000 B/s, 4-byte frames
        let config = RecordingConfiguration {
            sample_rate: 16000,
            max_payload_bytes: None,
            max_duration_secs: Some(0.00001),
            ..Default::default()
        };
        assert_eq!(config.payload_budget().unwrap(), Some(4));

        let config = RecordingConfiguration {
            max_duration_secs: Some(1.5),
            ..config
        };
        assert_eq!(config.payload_budget().unwrap(), Some(96000));
    }

    #[test]
    fn smaller_bound_wins() {
        let config = RecordingConfiguration {
            sample_rate: 16000,
            max_payload_bytes: Some(1000),
            max_duration_secs: Some(10.0),
            ..Default::default()
        };
        assert_eq!(config.payload_budget().unwrap(), Some(1000));
    }

    #[test]
    fn unbounded_without_limits() {
        let config = RecordingConfiguration {
            max_payload_bytes: None,
            ..Default::default()
        };
        assert_eq!(config.payload_budget().unwrap(), None);
    }

    #[test]
    fn huge_duration_does_not_overflow_the_budget() {
        let config = RecordingConfiguration {
            max_duration_secs: Some(1e20),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.payload_budget().unwrap(), Some(2 * 1024 * 1024));

        let config = RecordingConfiguration {
            max_payload_bytes: None,
            ..config
        };
        assert_eq!(config.payload_budget().unwrap(), None);
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let json = r#"{ "sample_rate": 16000, "chunking_mode": "per_frame",
                        "read_error_policy": { "fail_after": { "consecutive": 3 } } }"#;
        let config: RecordingConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.chunking_mode, ChunkingMode::PerFrame);
        assert_eq!(config.read_error_policy, ReadErrorPolicy::FailAfter { consecutive: 3 });
        assert_eq!(config.bit_depth, 16);
        assert_eq!(config.frame_bytes, 2048);
    }
}
