use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use serde::Serialize;

use crate::models::error::CaptureError;
use crate::models::recording_result::payload_duration_secs;
use crate::processing::wav_format::{self, WaveHeader, DATA_SUB_CHUNK_HEADER_SIZE, WAV_HEADER_SIZE};

/// How the bytes after the header are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DataLayout {
    /// One contiguous data chunk whose length matches the header.
    Single,
    /// A chain of 8-byte `data` sub-chunk headers, each followed by its payload.
    PerFrame { frames: u64 },
    /// Neither layout accounts for the bytes on disk.
    Unknown,
}

/// Consistency report for a recording on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub header: WaveHeader,
    pub file_len: u64,
    pub layout: DataLayout,
    /// `fileSize` equals the file length minus 8.
    pub riff_size_consistent: bool,
    pub duration_secs: f64,
}

impl FileReport {
    /// Whether a reader would see exactly the payload the header describes.
    pub fn is_consistent(&self) -> bool {
        self.riff_size_consistent && self.layout != DataLayout::Unknown
    }
}

/// Inspect a recording on the host filesystem.
pub fn inspect_file(path: &Path) -> Result<FileReport, CaptureError> {
    let file = File::open(path).map_err(|e| CaptureError::FileOpen(format!("{}: {}", path.display(), e)))?;
    inspect(BufReader::new(file))
}

/// Parse the header of `reader` and check it against the bytes that follow.
pub fn inspect<R: Read + Seek>(mut reader: R) -> Result<FileReport, CaptureError> {
    let file_len = reader
        .seek(SeekFrom::End(0))
        .map_err(|e| CaptureError::FileOpen(format!("seek failed: {}", e)))?;

    let mut header_bytes = [0u8; WAV_HEADER_SIZE];
    reader
        .seek(SeekFrom::Start(0))
        .and_then(|_| reader.read_exact(&mut header_bytes))
        .map_err(|e| CaptureError::InvalidFormat(format!("cannot read header: {}", e)))?;
    let header = wav_format::parse_header(&header_bytes)?;

    let riff_size_consistent = header.file_size as u64 + 8 == file_len;
    let body_len = file_len - WAV_HEADER_SIZE as u64;

    let layout = if header.data_bytes as u64 == body_len {
        DataLayout::Single
    } else {
        walk_sub_chunks(&mut reader, file_len, header.data_bytes as u64)?
    };

    Ok(FileReport {
        header,
        file_len,
        layout,
        riff_size_consistent,
        duration_secs: payload_duration_secs(&header, header.data_bytes as u64),
    })
}

/// Follow `data` sub-chunk headers from the end of the main header.
fn walk_sub_chunks<R: Read + Seek>(reader: &mut R, file_len: u64, data_bytes: u64) -> Result<DataLayout, CaptureError> {
    let mut offset = WAV_HEADER_SIZE as u64;
    let mut payload = 0u64;
    let mut frames = 0u64;
    let mut chunk_header = [0u8; DATA_SUB_CHUNK_HEADER_SIZE];

    while offset + DATA_SUB_CHUNK_HEADER_SIZE as u64 <= file_len {
        reader
            .seek(SeekFrom::Start(offset))
            .and_then(|_| reader.read_exact(&mut chunk_header))
            .map_err(|e| CaptureError::InvalidFormat(format!("cannot read sub-chunk at {}: {}", offset, e)))?;
        if &chunk_header[0..4] != b"data" {
            return Ok(DataLayout::Unknown);
        }
        let len = u32::from_le_bytes([chunk_header[4], chunk_header[5], chunk_header[6], chunk_header[7]]) as u64;
        offset += DATA_SUB_CHUNK_HEADER_SIZE as u64 + len;
        payload += len;
        frames += 1;
    }

    if frames > 0 && offset == file_len && payload == data_bytes {
        Ok(DataLayout::PerFrame { frames })
    } else {
        Ok(DataLayout::Unknown)
    }
}
