use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::traits::block_storage::{BlockStorage, StorageHandle};

/// [`BlockStorage`] over a directory of the host filesystem.
///
/// The root plays the role of the mount point; relative output paths are
/// resolved against it.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
    create_root: bool,
    mounted: bool,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            create_root: false,
            mounted: false,
        }
    }

    /// Create the root directory on mount instead of failing when it is missing.
    pub fn create_root(mut self, create: bool) -> Self {
        self.create_root = create;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }
}

impl BlockStorage for FsStorage {
    type Handle = BufWriter<File>;

    fn mount(&mut self) -> Result<(), CaptureError> {
        if !self.root.exists() && self.create_root {
            fs::create_dir_all(&self.root).map_err(|e| {
                CaptureError::StorageMount(format!("failed to create {}: {}", self.root.display(), e))
            })?;
        }
        if !self.root.is_dir() {
            return Err(CaptureError::StorageMount(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        log::info!("Storage mounted at {}", self.root.display());
        self.mounted = true;
        Ok(())
    }

    fn create(&mut self, path: &Path) -> Result<Self::Handle, CaptureError> {
        if !self.mounted {
            return Err(CaptureError::InvalidState("storage is not mounted".into()));
        }
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::FileOpen(format!("failed to create directory: {}", e)))?;
        }

        let file = File::create(&full_path)
            .map_err(|e| CaptureError::FileOpen(format!("{}: {}", full_path.display(), e)))?;
        Ok(BufWriter::new(file))
    }

    fn unmount(&mut self) -> Result<(), CaptureError> {
        if self.mounted {
            log::info!("Storage at {} released", self.root.display());
        }
        self.mounted = false;
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl StorageHandle for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

impl StorageHandle for BufWriter<File> {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.get_ref().sync_all()
    }
}
