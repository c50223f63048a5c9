//! Whole-file replacement via write-to-temp then rename

use crate::error::{StorageError, StorageResult};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes into `<path>.tmp` and renames over `path` on commit.
///
/// Readers never observe a half-written file: either the previous content or
/// the committed content is visible. Dropping without commit removes the temp file.
pub struct AtomicWriter {
    temp_path: PathBuf,
    final_path: PathBuf,
    file: File,
}

impl AtomicWriter {
    /// Create a writer for `path`, creating parent directories as needed
    pub fn new<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::open(path.as_ref(), false)
    }

    /// Like [`AtomicWriter::new`], but the file is readable by its owner only (unix)
    pub fn owner_only<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::open(path.as_ref(), true)
    }

    fn open(final_path: &Path, owner_only: bool) -> StorageResult<Self> {
        if let Some(parent) = final_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let temp_path = Self::temp_path(final_path);
        // Stale temp files keep their old mode; start fresh
        let _ = fs::remove_file(&temp_path);
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);

        #[cfg(unix)]
        if owner_only {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        #[cfg(not(unix))]
        let _ = owner_only;

        let file = options.open(&temp_path)?;

        Ok(Self {
            temp_path,
            final_path: final_path.to_path_buf(),
            file,
        })
    }

    pub fn write(&mut self, data: &[u8]) -> StorageResult<()> {
        self.file.write_all(data)?;
        Ok(())
    }

    /// Flush to disk and rename over the destination
    pub fn commit(mut self) -> StorageResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;

        let temp_path = self.temp_path.clone();
        let final_path = self.final_path.clone();

        // Drop would remove the temp file
        std::mem::forget(self);

        if let Err(e) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn temp_path(final_path: &Path) -> PathBuf {
        let mut temp = final_path.as_os_str().to_owned();
        temp.push(".tmp");
        PathBuf::from(temp)
    }
}

impl Drop for AtomicWriter {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.temp_path);
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path`
pub fn write_json<T: Serialize>(path: &Path, value: &T, owner_only: bool) -> StorageResult<()> {
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

    let mut writer = if owner_only {
        AtomicWriter::owner_only(path)?
    } else {
        AtomicWriter::new(path)?
    };
    writer.write(&body)?;
    writer.commit()
}
