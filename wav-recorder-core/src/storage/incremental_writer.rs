use std::io::{Seek, SeekFrom, Write};

use sha2::{Digest, Sha256};

use crate::models::config::ChunkingMode;
use crate::models::error::CaptureError;
use crate::processing::wav_format::{self, WaveHeader, DATA_SUB_CHUNK_HEADER_SIZE, WAV_HEADER_SIZE};
use crate::traits::block_storage::StorageHandle;

/// Streaming WAV writer that keeps the file valid after every append.
///
/// Each [`append_frame`](Self::append_frame) writes the frame at the end of
/// the file, recomputes the header, rewrites it at offset 0 and syncs before
/// returning. A successful append therefore leaves a complete WAV file on
/// stable storage describing exactly the payload written so far.
///
/// ## File Format
///
/// **Single chunk (default):**
/// ```text
/// [44-byte WAV header]
/// [raw PCM frame 1][raw PCM frame 2]...
/// ```
///
/// **Per-frame sub-chunks (non-conformant):**
/// ```text
/// [44-byte WAV header]
/// ["data" | 4-byte LE length | PCM frame 1]
/// ["data" | 4-byte LE length | PCM frame 2]
/// ...
/// ```
/// The header's `dataBytes` counts payload only, sub-chunk headers excluded.
///
/// Any storage failure poisons the writer: later appends are refused so a
/// file whose header may disagree with its payload is never extended.
pub struct IncrementalFileWriter<H: StorageHandle> {
    handle: H,
    header: WaveHeader,
    mode: ChunkingMode,
    end_offset: u64,
    payload_bytes: u64,
    frames_appended: u64,
    hasher: Sha256,
    poisoned: bool,
}

/// Final counters of a closed writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterSummary {
    pub header: WaveHeader,
    pub total_bytes: u64,
    pub payload_bytes: u64,
    pub frames_appended: u64,
    /// SHA-256 of the payload bytes, lowercase hex.
    pub checksum: String,
}

impl<H: StorageHandle> IncrementalFileWriter<H> {
    /// Write the initial header (no payload) to a freshly created handle and sync it.
    pub fn open(handle: H, header: WaveHeader, mode: ChunkingMode) -> Result<Self, CaptureError> {
        let mut writer = Self {
            handle,
            header: header.resized(WAV_HEADER_SIZE as u64, 0)?,
            mode,
            end_offset: 0,
            payload_bytes: 0,
            frames_appended: 0,
            hasher: Sha256::new(),
            poisoned: false,
        };

        if mode == ChunkingMode::PerFrame {
            log::warn!("Per-frame data sub-chunks produce a non-conformant WAV file");
        }

        writer.guarded(|w| {
            let bytes = wav_format::serialize_header(&w.header);
            w.seek_to(SeekFrom::Start(0))?;
            w.write_bytes(&bytes)?;
            w.end_offset = WAV_HEADER_SIZE as u64;
            w.sync_to_storage()
        })?;
        Ok(writer)
    }

    /// Append one frame of PCM bytes and make the result durable.
    ///
    /// An empty frame is a no-op: nothing is written and the header is not touched.
    pub fn append_frame(&mut self, bytes: &[u8]) -> Result<(), CaptureError> {
        if self.poisoned {
            return Err(CaptureError::InvalidState(
                "writer failed earlier; refusing to append".into(),
            ));
        }
        if bytes.is_empty() {
            return Ok(());
        }

        let framing = match self.mode {
            ChunkingMode::Single => 0,
            ChunkingMode::PerFrame => DATA_SUB_CHUNK_HEADER_SIZE as u64,
        };
        let new_end = self.end_offset + framing + bytes.len() as u64;
        let new_payload = self.payload_bytes + bytes.len() as u64;

        // Checked before touching storage so an oversized frame leaves the file intact.
        let next_header = self.header.resized(new_end, new_payload)?;

        self.guarded(|w| {
            if w.mode == ChunkingMode::PerFrame {
                let frame_len = u32::try_from(bytes.len())
                    .map_err(|_| CaptureError::FileTooLarge(format!("frame of {} bytes", bytes.len())))?;
                w.write_bytes(&wav_format::build_data_sub_chunk_header(frame_len))?;
            }
            w.write_bytes(bytes)?;

            w.end_offset = new_end;
            w.payload_bytes = new_payload;
            w.frames_appended += 1;
            w.header = next_header;
            w.hasher.update(bytes);

            let header_bytes = wav_format::serialize_header(&w.header);
            w.patch_region(0, &header_bytes)?;
            w.sync_to_storage()
        })?;

        log::trace!(
            "Appended {} bytes (payload {}, file {})",
            bytes.len(),
            self.payload_bytes,
            self.end_offset
        );
        Ok(())
    }

    /// Rewrite the header one last time, sync, and release the handle.
    pub fn close(mut self) -> Result<WriterSummary, CaptureError> {
        if self.poisoned {
            return Err(CaptureError::InvalidState("writer failed earlier; not finalizing".into()));
        }

        self.guarded(|w| {
            let header_bytes = wav_format::serialize_header(&w.header);
            w.patch_region(0, &header_bytes)?;
            w.sync_to_storage()
        })?;

        Ok(WriterSummary {
            header: self.header,
            total_bytes: self.end_offset,
            payload_bytes: self.payload_bytes,
            frames_appended: self.frames_appended,
            checksum: hex_encode(&self.hasher.finalize()),
        })
    }

    /// Release the handle without touching the file again.
    ///
    /// For a writer that hit a storage failure: the file stays as of its
    /// last successful sync.
    pub fn abandon(self) {
        log::warn!("Abandoning file; it stays as of its last successful sync");
        drop(self.handle);
    }

    /// Header as last written to storage.
    pub fn header(&self) -> &WaveHeader {
        &self.header
    }

    /// Total bytes in the file, header included.
    pub fn total_bytes(&self) -> u64 {
        self.end_offset
    }

    /// Audio payload bytes appended so far.
    pub fn payload_bytes(&self) -> u64 {
        self.payload_bytes
    }

    pub fn frames_appended(&self) -> u64 {
        self.frames_appended
    }

    pub fn chunking_mode(&self) -> ChunkingMode {
        self.mode
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Run `op`, poisoning the writer if it fails.
    fn guarded(&mut self, op: impl FnOnce(&mut Self) -> Result<(), CaptureError>) -> Result<(), CaptureError> {
        let result = op(self);
        if let Err(ref e) = result {
            log::error!("Storage failure, abandoning file: {}", e);
            self.poisoned = true;
        }
        result
    }

    /// Overwrite a fixed block at `offset`, then return to the end of the file.
    fn patch_region(&mut self, offset: u64, block: &[u8]) -> Result<(), CaptureError> {
        self.seek_to(SeekFrom::Start(offset))?;
        self.write_bytes(block)?;
        self.seek_to(SeekFrom::Start(self.end_offset))
    }

    /// Flush in-process buffers, then force the data to stable storage.
    fn sync_to_storage(&mut self) -> Result<(), CaptureError> {
        self.handle
            .flush()
            .map_err(|e| CaptureError::StorageSync(format!("flush failed: {}", e)))?;
        self.handle
            .sync()
            .map_err(|e| CaptureError::StorageSync(format!("sync failed: {}", e)))
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        self.handle
            .write_all(data)
            .map_err(|e| CaptureError::StorageWrite(format!("write failed: {}", e)))
    }

    fn seek_to(&mut self, pos: SeekFrom) -> Result<(), CaptureError> {
        self.handle
            .seek(pos)
            .map(|_| ())
            .map_err(|e| CaptureError::StorageWrite(format!("seek failed: {}", e)))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
