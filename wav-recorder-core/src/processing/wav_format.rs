//! WAV (RIFF/WAVE) header codec.
//!
//! Builds, serializes and parses the canonical 44-byte PCM header plus the
//! 8-byte `data` sub-chunk header used by per-frame framing. Pure functions,
//! no I/O.

use serde::Serialize;

use crate::models::error::CaptureError;

/// Size of the canonical WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Size of a `data` sub-chunk header (tag + length).
pub const DATA_SUB_CHUNK_HEADER_SIZE: usize = 8;

/// `fileSize` of a header with no payload: everything after the first 8 bytes.
pub const EMPTY_FILE_SIZE: u32 = (WAV_HEADER_SIZE - 8) as u32;

/// WAVE_FORMAT_PCM.
pub const PCM_FORMAT_TAG: u16 = 1;

const PCM_FMT_CHUNK_SIZE: u32 = 16;

pub const SUPPORTED_CHANNELS: [u16; 2] = [1, 2];
pub const SUPPORTED_BIT_DEPTHS: [u16; 4] = [8, 16, 24, 32];

/// In-memory form of the 44-byte header.
///
/// `file_size` is the total file length minus 8 and `data_bytes` the payload
/// length. Both are recomputed as a whole (see [`WaveHeader::resized`]) rather
/// than patched field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WaveHeader {
    pub file_size: u32,
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bit_depth: u16,
    pub byte_rate: u32,
    pub block_align: u16,
    pub data_bytes: u32,
}

impl WaveHeader {
    /// Copy of this header describing a file of `total_bytes` holding
    /// `payload_bytes` of audio.
    ///
    /// Fails with [`CaptureError::FileTooLarge`] once either count no longer
    /// fits the 32-bit RIFF fields.
    pub fn resized(&self, total_bytes: u64, payload_bytes: u64) -> Result<Self, CaptureError> {
        let file_size = total_bytes
            .checked_sub(8)
            .ok_or_else(|| CaptureError::InvalidState(format!("file of {} bytes has no RIFF header", total_bytes)))?;
        let file_size = u32::try_from(file_size)
            .map_err(|_| CaptureError::FileTooLarge(format!("file size {} exceeds 4 GiB", total_bytes)))?;
        let data_bytes = u32::try_from(payload_bytes)
            .map_err(|_| CaptureError::FileTooLarge(format!("payload size {} exceeds 4 GiB", payload_bytes)))?;
        Ok(Self {
            file_size,
            data_bytes,
            ..*self
        })
    }

    /// Bytes per sample for a single channel.
    pub fn bytes_per_sample(&self) -> u16 {
        self.bit_depth / 8
    }
}

/// Build the header for a new recording with no payload yet.
///
/// Accepts 1 or 2 channels, 8/16/24/32-bit samples and a non-zero sample rate.
pub fn build_header(channels: u16, sample_rate_hz: u32, bit_depth: u16) -> Result<WaveHeader, CaptureError> {
    if !SUPPORTED_CHANNELS.contains(&channels) {
        return Err(CaptureError::InvalidFormat(format!("unsupported channel count: {}", channels)));
    }
    if !SUPPORTED_BIT_DEPTHS.contains(&bit_depth) {
        return Err(CaptureError::InvalidFormat(format!("unsupported bit depth: {}", bit_depth)));
    }
    if sample_rate_hz == 0 {
        return Err(CaptureError::InvalidFormat("sample rate must be positive".into()));
    }

    let block_align = channels * bit_depth / 8;
    let byte_rate = sample_rate_hz
        .checked_mul(block_align as u32)
        .ok_or_else(|| CaptureError::InvalidFormat(format!("byte rate overflows at {} Hz", sample_rate_hz)))?;

    Ok(WaveHeader {
        file_size: EMPTY_FILE_SIZE,
        format_tag: PCM_FORMAT_TAG,
        channels,
        sample_rate: sample_rate_hz,
        bit_depth,
        byte_rate,
        block_align,
        data_bytes: 0,
    })
}

/// Serialize a header into its 44-byte little-endian form.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  format tag (1 = PCM)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_bytes
/// ```
pub fn serialize_header(header: &WaveHeader) -> [u8; WAV_HEADER_SIZE] {
    let mut out = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    out[0..4].copy_from_slice(b"RIFF");
    out[4..8].copy_from_slice(&header.file_size.to_le_bytes());
    out[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    out[12..16].copy_from_slice(b"fmt ");
    out[16..20].copy_from_slice(&PCM_FMT_CHUNK_SIZE.to_le_bytes());
    out[20..22].copy_from_slice(&header.format_tag.to_le_bytes());
    out[22..24].copy_from_slice(&header.channels.to_le_bytes());
    out[24..28].copy_from_slice(&header.sample_rate.to_le_bytes());
    out[28..32].copy_from_slice(&header.byte_rate.to_le_bytes());
    out[32..34].copy_from_slice(&header.block_align.to_le_bytes());
    out[34..36].copy_from_slice(&header.bit_depth.to_le_bytes());

    // data sub-chunk
    out[36..40].copy_from_slice(b"data");
    out[40..44].copy_from_slice(&header.data_bytes.to_le_bytes());

    out
}

/// 8-byte `data` tag + little-endian length, prefixed to each frame in
/// per-frame framing.
pub fn build_data_sub_chunk_header(payload_len: u32) -> [u8; DATA_SUB_CHUNK_HEADER_SIZE] {
    let mut out = [0u8; DATA_SUB_CHUNK_HEADER_SIZE];
    out[0..4].copy_from_slice(b"data");
    out[4..8].copy_from_slice(&payload_len.to_le_bytes());
    out
}

/// Parse the first 44 bytes of a file back into a [`WaveHeader`].
///
/// Only the canonical layout produced by [`serialize_header`] is accepted:
/// a 16-byte PCM `fmt ` chunk immediately followed by `data`.
pub fn parse_header(bytes: &[u8]) -> Result<WaveHeader, CaptureError> {
    if bytes.len() < WAV_HEADER_SIZE {
        return Err(CaptureError::InvalidFormat(format!(
            "header needs {} bytes, got {}",
            WAV_HEADER_SIZE,
            bytes.len()
        )));
    }

    expect_tag(bytes, 0, b"RIFF")?;
    expect_tag(bytes, 8, b"WAVE")?;
    expect_tag(bytes, 12, b"fmt ")?;
    expect_tag(bytes, 36, b"data")?;

    let fmt_size = read_u32(bytes, 16);
    if fmt_size != PCM_FMT_CHUNK_SIZE {
        return Err(CaptureError::InvalidFormat(format!("unexpected fmt chunk size: {}", fmt_size)));
    }
    let format_tag = read_u16(bytes, 20);
    if format_tag != PCM_FORMAT_TAG {
        return Err(CaptureError::InvalidFormat(format!("not PCM (format tag {})", format_tag)));
    }

    let channels = read_u16(bytes, 22);
    let sample_rate = read_u32(bytes, 24);
    let bit_depth = read_u16(bytes, 34);

    let expected = build_header(channels, sample_rate, bit_depth)?;
    let byte_rate = read_u32(bytes, 28);
    let block_align = read_u16(bytes, 32);
    if byte_rate != expected.byte_rate || block_align != expected.block_align {
        return Err(CaptureError::InvalidFormat(format!(
            "derived fields disagree: byte rate {} (expected {}), block align {} (expected {})",
            byte_rate, expected.byte_rate, block_align, expected.block_align
        )));
    }

    Ok(WaveHeader {
        file_size: read_u32(bytes, 4),
        data_bytes: read_u32(bytes, 40),
        ..expected
    })
}

fn expect_tag(bytes: &[u8], offset: usize, tag: &[u8; 4]) -> Result<(), CaptureError> {
    if &bytes[offset..offset + 4] != tag {
        return Err(CaptureError::InvalidFormat(format!(
            "expected {:?} at offset {}",
            String::from_utf8_lossy(tag),
            offset
        )));
    }
    Ok(())
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}
