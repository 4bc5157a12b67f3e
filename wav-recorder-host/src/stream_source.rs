//! Raw PCM from any byte stream (stdin, a file, a pipe from `arecord`).
//!
//! A reader thread pulls fixed-size chunks from the stream into a bounded
//! queue; `read` pops from the queue with the capture loop's timeout, the way
//! a DMA-backed serial audio driver hands out filled buffers.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use wav_recorder_core::{AudioRead, AudioSource, CaptureError, StopHandle};

const DEFAULT_QUEUE_DEPTH: usize = 16;

enum Chunk {
    Data(Vec<u8>),
    Failed(String),
}

/// [`AudioSource`] over a `Read` stream of interleaved PCM bytes.
///
/// When the stream ends, the queue is drained first; after that the source
/// requests a stop on its end-of-stream handle (if one was given) and keeps
/// reporting timeouts.
pub struct StreamSource<R: Read + Send + 'static> {
    name: String,
    input: Option<R>,
    chunk_bytes: usize,
    queue_depth: usize,
    receiver: Option<Receiver<Chunk>>,
    pending: Vec<u8>,
    pending_offset: usize,
    running: Arc<AtomicBool>,
    reader_handle: Option<thread::JoinHandle<()>>,
    end_signal: Option<StopHandle>,
    exhausted: bool,
}

impl<R: Read + Send + 'static> StreamSource<R> {
    pub fn new(name: impl Into<String>, input: R, chunk_bytes: usize) -> Self {
        Self {
            name: name.into(),
            input: Some(input),
            chunk_bytes: chunk_bytes.max(1),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            receiver: None,
            pending: Vec::new(),
            pending_offset: 0,
            running: Arc::new(AtomicBool::new(false)),
            reader_handle: None,
            end_signal: None,
            exhausted: false,
        }
    }

    /// Request a stop on `stop` once the stream is exhausted.
    pub fn stop_at_end(mut self, stop: StopHandle) -> Self {
        self.end_signal = Some(stop);
        self
    }

    /// Number of chunks buffered ahead of the capture loop.
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn take_pending(&mut self, buffer: &mut [u8]) -> usize {
        let remaining = &self.pending[self.pending_offset..];
        let n = remaining.len().min(buffer.len());
        buffer[..n].copy_from_slice(&remaining[..n]);
        self.pending_offset += n;
        if self.pending_offset == self.pending.len() {
            self.pending.clear();
            self.pending_offset = 0;
        }
        n
    }
}

impl<R: Read + Send + 'static> AudioSource for StreamSource<R> {
    fn start(&mut self) -> Result<(), CaptureError> {
        let input = self
            .input
            .take()
            .ok_or_else(|| CaptureError::DeviceInit(format!("{} was already consumed", self.name)))?;

        let (tx, rx) = mpsc::sync_channel(self.queue_depth);
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let chunk_bytes = self.chunk_bytes;

        let handle = thread::Builder::new()
            .name("pcm-reader".into())
            .spawn(move || reader_loop(input, chunk_bytes, running, tx))
            .map_err(|e| CaptureError::DeviceInit(format!("failed to spawn reader thread: {}", e)))?;

        self.reader_handle = Some(handle);
        self.receiver = Some(rx);
        self.exhausted = false;
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8], timeout: Duration) -> AudioRead {
        if self.pending_offset < self.pending.len() {
            return AudioRead::Data(self.take_pending(buffer));
        }

        let Some(receiver) = self.receiver.as_ref() else {
            return AudioRead::Error(format!("{} is not started", self.name));
        };

        match receiver.recv_timeout(timeout) {
            Ok(Chunk::Data(bytes)) => {
                self.pending = bytes;
                self.pending_offset = 0;
                AudioRead::Data(self.take_pending(buffer))
            }
            Ok(Chunk::Failed(reason)) => AudioRead::Error(reason),
            Err(RecvTimeoutError::Timeout) => AudioRead::Timeout,
            Err(RecvTimeoutError::Disconnected) => {
                if !self.exhausted {
                    log::info!("{} reached end of stream", self.name);
                    self.exhausted = true;
                    if let Some(ref stop) = self.end_signal {
                        stop.request_stop();
                    }
                }
                // Behave like a silent device rather than spinning.
                thread::sleep(timeout);
                AudioRead::Timeout
            }
        }
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        // Dropping the receiver unblocks a reader waiting on a full queue.
        self.receiver = None;
        if let Some(handle) = self.reader_handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                // Blocked in a read on the underlying stream; it exits on its next chunk.
                log::debug!("{} reader still blocked on input, detaching", self.name);
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} ({}-byte chunks)", self.name, self.chunk_bytes)
    }
}

/// Fill chunks from `input` until EOF, an error, or `running` goes false.
fn reader_loop<R: Read>(mut input: R, chunk_bytes: usize, running: Arc<AtomicBool>, tx: SyncSender<Chunk>) {
    while running.load(Ordering::SeqCst) {
        let mut chunk = vec![0u8; chunk_bytes];
        let mut filled = 0;
        let mut failure = None;

        while filled < chunk_bytes {
            match input.read(&mut chunk[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let at_eof = filled < chunk_bytes && failure.is_none();
        if filled > 0 {
            chunk.truncate(filled);
            if tx.send(Chunk::Data(chunk)).is_err() {
                return;
            }
        }
        if let Some(e) = failure {
            let _ = tx.send(Chunk::Failed(e.to_string()));
            return;
        }
        if at_eof {
            return;
        }
    }
}
