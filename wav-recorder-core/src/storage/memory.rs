use std::collections::HashMap;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::traits::block_storage::{BlockStorage, StorageHandle};

/// Volatile [`BlockStorage`] that keeps files in memory.
///
/// Each file has a working copy and a durable copy; bytes only reach the
/// durable copy on a successful `sync`. [`MemoryStorage::durable_contents`]
/// therefore shows what would survive a power cut at that instant.
///
/// Faults can be injected on the n-th write, seek or sync call (1-based,
/// counted across all handles) to exercise error paths.
///
/// Clones share the same volume.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    volume: Arc<Mutex<Volume>>,
}

#[derive(Debug, Default)]
struct Volume {
    files: HashMap<PathBuf, MemoryFile>,
    mounted: bool,
    mount_count: u32,
    unmount_count: u32,
    open_handles: u32,
    open_handles_at_unmount: u32,
    faults: Faults,
    writes: u64,
    seeks: u64,
    syncs: u64,
}

#[derive(Debug, Default)]
struct MemoryFile {
    working: Vec<u8>,
    durable: Vec<u8>,
}

#[derive(Debug, Default)]
struct Faults {
    mount: Option<String>,
    create: Option<String>,
    write_at: Option<u64>,
    seek_at: Option<u64>,
    sync_at: Option<u64>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_mount(&self, reason: &str) {
        self.volume.lock().faults.mount = Some(reason.to_string());
    }

    pub fn fail_create(&self, reason: &str) {
        self.volume.lock().faults.create = Some(reason.to_string());
    }

    pub fn fail_write_at(&self, nth: u64) {
        self.volume.lock().faults.write_at = Some(nth);
    }

    pub fn fail_seek_at(&self, nth: u64) {
        self.volume.lock().faults.seek_at = Some(nth);
    }

    pub fn fail_sync_at(&self, nth: u64) {
        self.volume.lock().faults.sync_at = Some(nth);
    }

    /// Current bytes of `path`, including unsynced writes.
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.volume.lock().files.get(path).map(|f| f.working.clone())
    }

    /// Bytes of `path` as of its last successful sync.
    pub fn durable_contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.volume.lock().files.get(path).map(|f| f.durable.clone())
    }

    pub fn is_mounted(&self) -> bool {
        self.volume.lock().mounted
    }

    pub fn mount_count(&self) -> u32 {
        self.volume.lock().mount_count
    }

    pub fn unmount_count(&self) -> u32 {
        self.volume.lock().unmount_count
    }

    /// Handles created and not yet dropped.
    pub fn open_handles(&self) -> u32 {
        self.volume.lock().open_handles
    }

    /// Handles that were still open at the most recent unmount.
    pub fn open_handles_at_unmount(&self) -> u32 {
        self.volume.lock().open_handles_at_unmount
    }

    pub fn write_count(&self) -> u64 {
        self.volume.lock().writes
    }

    pub fn sync_count(&self) -> u64 {
        self.volume.lock().syncs
    }
}

impl BlockStorage for MemoryStorage {
    type Handle = MemoryHandle;

    fn mount(&mut self) -> Result<(), CaptureError> {
        let mut volume = self.volume.lock();
        if let Some(reason) = &volume.faults.mount {
            return Err(CaptureError::StorageMount(reason.clone()));
        }
        volume.mounted = true;
        volume.mount_count += 1;
        Ok(())
    }

    fn create(&mut self, path: &Path) -> Result<Self::Handle, CaptureError> {
        let mut volume = self.volume.lock();
        if !volume.mounted {
            return Err(CaptureError::InvalidState("storage is not mounted".into()));
        }
        if let Some(reason) = &volume.faults.create {
            return Err(CaptureError::FileOpen(reason.clone()));
        }
        volume.files.insert(path.to_path_buf(), MemoryFile::default());
        volume.open_handles += 1;
        Ok(MemoryHandle {
            volume: Arc::clone(&self.volume),
            path: path.to_path_buf(),
            position: 0,
        })
    }

    fn unmount(&mut self) -> Result<(), CaptureError> {
        let mut volume = self.volume.lock();
        if volume.open_handles > 0 {
            log::warn!("Unmounting with {} open handle(s)", volume.open_handles);
        }
        volume.mounted = false;
        volume.unmount_count += 1;
        volume.open_handles_at_unmount = volume.open_handles;
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

/// Open file on a [`MemoryStorage`] volume.
#[derive(Debug)]
pub struct MemoryHandle {
    volume: Arc<Mutex<Volume>>,
    path: PathBuf,
    position: u64,
}

impl MemoryHandle {
    fn with_file<T>(&self, f: impl FnOnce(&mut MemoryFile) -> T) -> io::Result<T> {
        let mut volume = self.volume.lock();
        volume
            .files
            .get_mut(&self.path)
            .map(f)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file removed from volume"))
    }
}

fn injected(counter: u64, fault: Option<u64>, op: &str) -> io::Result<()> {
    if fault == Some(counter) {
        return Err(io::Error::other(format!("injected {} failure", op)));
    }
    Ok(())
}

impl Write for MemoryHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        {
            let mut volume = self.volume.lock();
            volume.writes += 1;
            injected(volume.writes, volume.faults.write_at, "write")?;
        }
        let start = self.position as usize;
        self.with_file(|file| {
            let end = start + buf.len();
            if file.working.len() < end {
                file.working.resize(end, 0);
            }
            file.working[start..end].copy_from_slice(buf);
        })?;
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        {
            let mut volume = self.volume.lock();
            volume.seeks += 1;
            injected(volume.seeks, volume.faults.seek_at, "seek")?;
        }
        let len = self.with_file(|file| file.working.len() as u64)?;
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        self.position = target
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file"))?;
        Ok(self.position)
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        let mut volume = self.volume.lock();
        volume.open_handles = volume.open_handles.saturating_sub(1);
    }
}

impl StorageHandle for MemoryHandle {
    fn sync(&mut self) -> io::Result<()> {
        {
            let mut volume = self.volume.lock();
            volume.syncs += 1;
            injected(volume.syncs, volume.faults.sync_at, "sync")?;
        }
        self.with_file(|file| file.durable.clone_from(&file.working))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_synced_bytes_are_durable() {
        let mut storage = MemoryStorage::new();
        storage.mount().unwrap();
        let path = Path::new("a.wav");
        let mut handle = storage.create(path).unwrap();

        handle.write_all(b"hello").unwrap();
        assert_eq!(storage.durable_contents(path).unwrap(), b"");
        handle.sync().unwrap();
        handle.write_all(b" world").unwrap();

        assert_eq!(storage.durable_contents(path).unwrap(), b"hello");
        assert_eq!(storage.contents(path).unwrap(), b"hello world");
    }

    #[test]
    fn seek_overwrites_in_place() {
        let mut storage = MemoryStorage::new();
        storage.mount().unwrap();
        let path = Path::new("b.wav");
        let mut handle = storage.create(path).unwrap();

        handle.write_all(b"abcdef").unwrap();
        handle.seek(SeekFrom::Start(1)).unwrap();
        handle.write_all(b"XY").unwrap();
        assert_eq!(handle.seek(SeekFrom::End(0)).unwrap(), 6);

        assert_eq!(storage.contents(path).unwrap(), b"aXYdef");
    }

    #[test]
    fn injected_sync_fault_fires_once_at_the_nth_call() {
        let mut storage = MemoryStorage::new();
        storage.mount().unwrap();
        storage.fail_sync_at(2);
        let mut handle = storage.create(Path::new("c.wav")).unwrap();

        assert!(handle.sync().is_ok());
        assert!(handle.sync().is_err());
        assert!(handle.sync().is_ok());
        assert_eq!(storage.sync_count(), 3);
    }

    #[test]
    fn tracks_handles_left_open_at_unmount() {
        let mut storage = MemoryStorage::new();
        storage.mount().unwrap();
        let handle = storage.create(Path::new("e.wav")).unwrap();
        assert_eq!(storage.open_handles(), 1);

        storage.unmount().unwrap();
        assert_eq!(storage.open_handles_at_unmount(), 1);

        drop(handle);
        storage.mount().unwrap();
        storage.unmount().unwrap();
        assert_eq!(storage.open_handles(), 0);
        assert_eq!(storage.open_handles_at_unmount(), 0);
    }

    #[test]
    fn create_requires_mount() {
        let mut storage = MemoryStorage::new();
        assert!(matches!(
            storage.create(Path::new("d.wav")),
            Err(CaptureError::InvalidState(_))
        ));
    }
}
