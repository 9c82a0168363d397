//! Filesystem-backed raw block storage.
//!
//! Each block is one file named by [`block_file_name`] under the store root.
//! Writes go to a temporary file that is synced and then renamed over the
//! final name, so a reader never sees a torn block file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ember_core::error::StorageError;
use ember_core::traits::{block_file_name, BlockBytes};

const TMP_SUFFIX: &str = ".tmp";

fn io_err(e: io::Error) -> StorageError {
    StorageError::Io(e.to_string())
}

/// Directory of block files implementing [`BlockBytes`].
#[derive(Debug, Clone)]
pub struct FsBlockStore {
    root: PathBuf,
}

impl FsBlockStore {
    /// Open the store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(io_err)?;
        tracing::debug!(root = %root.display(), "opened block store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a location to a path inside the root. Anything that could escape
    /// the root is treated as unknown.
    fn resolve(&self, location: &str) -> Result<PathBuf, StorageError> {
        let unsafe_name = location.is_empty()
            || location.starts_with('.')
            || location.contains(['/', '\\'])
            || location.ends_with(TMP_SUFFIX);
        if unsafe_name {
            return Err(StorageError::NotFound(location.to_string()));
        }
        Ok(self.root.join(location))
    }
}

impl BlockBytes for FsBlockStore {
    fn save_block(&mut self, bytes: &[u8], height: u64) -> Result<String, StorageError> {
        let location = block_file_name(height);
        let path = self.resolve(&location)?;
        let tmp = self.root.join(format!("{location}{TMP_SUFFIX}"));

        {
            let mut file = File::create(&tmp).map_err(io_err)?;
            file.write_all(bytes).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(&tmp, &path).map_err(io_err)?;

        tracing::debug!(location = %location, size = bytes.len(), "saved block file");
        Ok(location)
    }

    fn load_block(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(location)?;
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(location.to_string()),
            _ => io_err(e),
        })
    }

    fn remove_block(&mut self, location: &str) -> Result<(), StorageError> {
        let path = self.resolve(location)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e)),
        }
    }
}
