use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::{ReadErrorPolicy, RecordingConfiguration};
use crate::models::error::CaptureError;
use crate::models::recording_result::{payload_duration_secs, RecordingMetadata, RecordingResult, StopReason};
use crate::models::state::CaptureState;
use crate::storage::incremental_writer::IncrementalFileWriter;
use crate::storage::metadata::write_metadata;
use crate::traits::audio_source::{AudioRead, AudioSource};
use crate::traits::block_storage::BlockStorage;
use crate::traits::capture_delegate::{CaptureDelegate, FrameProgress};

/// Cooperative stop signal for a running [`CaptureLoop`].
///
/// Checked once per loop iteration; an in-flight append and sync always
/// completes first. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Point-in-time view of a session, readable from any thread.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: CaptureState,
    pub payload_bytes: u64,
    pub total_bytes: u64,
    pub frames_appended: u64,
    pub read_timeouts: u64,
    pub read_errors: u64,
}

impl SessionSnapshot {
    fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            payload_bytes: 0,
            total_bytes: 0,
            frames_appended: 0,
            read_timeouts: 0,
            read_errors: 0,
        }
    }
}

/// Read-only observer of a [`CaptureLoop`] for other threads.
#[derive(Debug, Clone)]
pub struct SessionMonitor {
    shared: Arc<Mutex<SessionSnapshot>>,
}

impl SessionMonitor {
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.lock().clone()
    }

    pub fn state(&self) -> CaptureState {
        self.shared.lock().state.clone()
    }
}

/// Which capabilities the current session holds and must hand back.
#[derive(Debug, Default, Clone, Copy)]
struct Acquired {
    storage: bool,
    source: bool,
}

/// Drives one recording from an [`AudioSource`] into a WAV file on a
/// [`BlockStorage`] volume.
///
/// Single-threaded: [`run`](Self::run) blocks the calling thread for the
/// whole session. Other threads stop it through a [`StopHandle`] and watch
/// it through a [`SessionMonitor`].
///
/// ```text
/// [AudioSource] → read (bounded timeout) → [IncrementalFileWriter] → [BlockStorage]
/// ```
pub struct CaptureLoop<A: AudioSource, S: BlockStorage> {
    source: A,
    storage: S,
    config: RecordingConfiguration,
    shared: Arc<Mutex<SessionSnapshot>>,
    stop: StopHandle,
    delegate: Option<Arc<dyn CaptureDelegate>>,
    acquired: Acquired,
}

impl<A: AudioSource, S: BlockStorage> CaptureLoop<A, S> {
    pub fn new(source: A, storage: S, config: RecordingConfiguration) -> Self {
        Self {
            source,
            storage,
            config,
            shared: Arc::new(Mutex::new(SessionSnapshot::new())),
            stop: StopHandle::new(),
            delegate: None,
            acquired: Acquired::default(),
        }
    }

    /// Use an externally created stop handle, e.g. one shared with a signal handler.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn monitor(&self) -> SessionMonitor {
        SessionMonitor {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.shared.lock().state.clone()
    }

    pub fn config(&self) -> &RecordingConfiguration {
        &self.config
    }

    /// Hand the audio source and storage back to their owner.
    pub fn into_parts(self) -> (A, S) {
        (self.source, self.storage)
    }

    /// Record until the payload budget is reached or a stop is requested.
    ///
    /// Transitions: idle/closed → initializing → capturing → stopping → closed.
    /// Initialization failures go straight to closed. Both capabilities are
    /// released before this returns, whatever the outcome.
    pub fn run(&mut self) -> Result<RecordingResult, CaptureError> {
        if !self.state().can_start() {
            return Err(CaptureError::InvalidState(format!(
                "cannot start a session while {}",
                self.state().name()
            )));
        }

        *self.shared.lock() = SessionSnapshot::new();
        self.set_state(CaptureState::Initializing);

        let (mut writer, budget) = match self.initialize() {
            Ok(ready) => ready,
            Err(e) => {
                log::error!("Recording failed to initialize: {}", e);
                self.notify_error(&e);
                self.release();
                self.close_with(Some(e.clone()));
                return Err(e);
            }
        };

        log::info!(
            "Recording to {} ({} Hz, {} ch, {}-bit, budget {})",
            self.storage.resolve(&self.config.output_path).display(),
            self.config.sample_rate,
            self.config.channels,
            self.config.bit_depth,
            budget.map_or_else(|| "unbounded".to_string(), |b| format!("{} bytes", b)),
        );
        self.set_state(CaptureState::Capturing { payload_bytes: 0 });

        let outcome = self.capture(&mut writer, budget);

        let stop_error = outcome.as_ref().err().cloned();
        if let Some(ref e) = stop_error {
            log::error!("Recording stopped on error: {}", e);
            self.notify_error(e);
        }
        self.set_state(CaptureState::Stopping { error: stop_error });

        // The handle is closed here in every path, before capabilities are released.
        let summary = if writer.is_poisoned() {
            writer.abandon();
            Err(CaptureError::InvalidState("file abandoned after storage failure".into()))
        } else {
            writer.close()
        };

        let (reason, summary) = match (outcome, summary) {
            (Ok(reason), Ok(summary)) => (reason, summary),
            (Ok(_), Err(e)) => {
                log::error!("Recording failed to finalize: {}", e);
                self.notify_error(&e);
                self.release();
                self.close_with(Some(e.clone()));
                return Err(e);
            }
            (Err(e), summary) => {
                if let Err(close_err) = summary {
                    log::debug!("Writer not finalized: {}", close_err);
                }
                self.release();
                self.close_with(Some(e.clone()));
                return Err(e);
            }
        };

        let path = self.config.output_path.clone();
        let metadata = RecordingMetadata::new(
            &self.storage.resolve(&path).to_string_lossy(),
            &summary.header,
            self.config.chunking_mode,
            summary.total_bytes,
            summary.frames_appended,
            &summary.checksum,
            reason,
        );
        if self.config.write_metadata {
            // The recording itself is already complete and durable here.
            if let Err(e) = write_metadata(&mut self.storage, &metadata, &path) {
                log::warn!("Failed to write metadata sidecar: {}", e);
                self.notify_error(&e);
            }
        }

        self.release();

        let result = RecordingResult {
            file_path: self.storage.resolve(&path),
            payload_bytes: summary.payload_bytes,
            total_bytes: summary.total_bytes,
            frames_appended: summary.frames_appended,
            duration_secs: payload_duration_secs(&summary.header, summary.payload_bytes),
            checksum: summary.checksum,
            stop_reason: reason,
            metadata,
        };
        log::info!(
            "Recording closed: {} payload bytes in {} frames ({:.2}s, {:?})",
            result.payload_bytes,
            result.frames_appended,
            result.duration_secs,
            result.stop_reason
        );

        self.close_with(None);
        if let Some(ref delegate) = self.delegate {
            delegate.on_capture_finished(&result);
        }
        Ok(result)
    }

    // --- Internal helpers ---

    /// Acquire storage and device, create the file and write the empty header.
    fn initialize(&mut self) -> Result<(IncrementalFileWriter<S::Handle>, Option<u64>), CaptureError> {
        self.config.validate()?;
        let header = self.config.wave_header()?;
        let budget = self.config.payload_budget()?;

        self.storage.mount()?;
        self.acquired.storage = true;

        self.source.start()?;
        self.acquired.source = true;
        log::info!("Audio source started: {}", self.source.describe());

        let handle = self.storage.create(&self.config.output_path)?;
        let writer = IncrementalFileWriter::open(handle, header, self.config.chunking_mode)?;
        Ok((writer, budget))
    }

    /// The read → append cycle. Returns why capture ended, or the fatal error.
    fn capture(
        &mut self,
        writer: &mut IncrementalFileWriter<S::Handle>,
        budget: Option<u64>,
    ) -> Result<StopReason, CaptureError> {
        let mut buffer = vec![0u8; self.config.frame_bytes];
        let timeout = self.config.read_timeout();
        let mut consecutive_errors = 0u32;

        loop {
            if budget.is_some_and(|limit| writer.payload_bytes() >= limit) {
                return Ok(StopReason::ByteBudget);
            }
            if self.stop.is_stop_requested() {
                return Ok(StopReason::Cancelled);
            }

            match self.source.read(&mut buffer, timeout) {
                AudioRead::Data(0) | AudioRead::Timeout => {
                    log::debug!("No audio within {:?}", timeout);
                    self.shared.lock().read_timeouts += 1;
                }
                AudioRead::Data(n) => {
                    consecutive_errors = 0;
                    let n = n.min(buffer.len());
                    writer.append_frame(&buffer[..n])?;
                    self.record_progress(writer, n);
                }
                AudioRead::Error(reason) => {
                    consecutive_errors += 1;
                    self.shared.lock().read_errors += 1;
                    let err = CaptureError::AudioRead(reason);
                    log::warn!("{}", err);
                    self.notify_error(&err);

                    if let ReadErrorPolicy::FailAfter { consecutive } = self.config.read_error_policy {
                        if consecutive_errors >= consecutive {
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    fn record_progress(&self, writer: &IncrementalFileWriter<S::Handle>, frame_bytes: usize) {
        let progress = FrameProgress {
            frame_bytes,
            frames_appended: writer.frames_appended(),
            payload_bytes: writer.payload_bytes(),
            total_bytes: writer.total_bytes(),
        };
        {
            let mut s = self.shared.lock();
            s.state = CaptureState::Capturing {
                payload_bytes: progress.payload_bytes,
            };
            s.payload_bytes = progress.payload_bytes;
            s.total_bytes = progress.total_bytes;
            s.frames_appended = progress.frames_appended;
        }
        if let Some(ref delegate) = self.delegate {
            delegate.on_frame_appended(&progress);
        }
    }

    /// Stop the device and unmount the volume, whichever were acquired.
    fn release(&mut self) {
        if self.acquired.source {
            if let Err(e) = self.source.stop() {
                log::warn!("Failed to stop audio source: {}", e);
            }
            self.acquired.source = false;
        }
        if self.acquired.storage {
            if let Err(e) = self.storage.unmount() {
                log::warn!("Failed to unmount storage: {}", e);
            }
            self.acquired.storage = false;
        }
    }

    fn close_with(&self, error: Option<CaptureError>) {
        self.stop.reset();
        self.set_state(CaptureState::Closed { error });
    }

    fn set_state(&self, new_state: CaptureState) {
        log::debug!("Capture state → {}", new_state.name());
        {
            let mut s = self.shared.lock();
            s.state = new_state.clone();
        }
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&new_state);
        }
    }

    fn notify_error(&self, error: &CaptureError) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(error);
        }
    }
}
