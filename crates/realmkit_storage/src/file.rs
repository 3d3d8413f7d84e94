//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Suffix of the sidecar file that carries the advisory lock.
const LOCK_SUFFIX: &str = "lock";

/// Suffix of the scratch file written during [`StorageBackend::replace`].
const TEMP_SUFFIX: &str = "tmp";

/// A byte store backed by a single file.
///
/// `flush()` hands data to the OS, `sync()` calls `sync_all`. Opening with
/// [`FileBackend::open_exclusive`] additionally holds an advisory lock on a
/// `<file>.lock` sidecar for as long as the backend lives, so a second
/// process cannot append to the same log.
///
/// # Example
///
/// ```no_run
/// use realmkit_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open_exclusive(Path::new("default.realm")).unwrap();
/// backend.append(b"record").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
    size: u64,
    _lock: Option<File>,
}

impl FileBackend {
    /// Opens or creates the file at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories or the file cannot be created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = open_rw(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size,
            _lock: None,
        })
    }

    /// Opens the file and takes an exclusive lock on its sidecar.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another handle holds the lock.
    pub fn open_exclusive(path: &Path) -> StorageResult<Self> {
        let mut backend = Self::open(path)?;
        let lock_path = sidecar(path, LOCK_SUFFIX);
        let lock = open_rw(&lock_path)?;
        if lock.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked {
                path: path.to_path_buf(),
            });
        }
        tracing::debug!(path = %path.display(), "acquired store lock");
        backend._lock = Some(lock);
        Ok(backend)
    }

    /// Returns the path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let end = offset.saturating_add(len as u64);
        if end > self.size {
            return Err(StorageError::ReadPastEnd {
                offset,
                len,
                size: self.size,
            });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.size;
        if data.is_empty() {
            return Ok(offset);
        }
        let file = self.file.get_mut();
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        self.size += data.len() as u64;
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.get_mut().flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.get_mut().sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.size)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if new_size > self.size {
            return Err(StorageError::TruncatePastEnd {
                requested: new_size,
                size: self.size,
            });
        }
        let file = self.file.get_mut();
        file.set_len(new_size)?;
        file.sync_all()?;
        self.size = new_size;
        Ok(())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let temp_path = sidecar(&self.path, TEMP_SUFFIX);
        {
            let mut temp = File::create(&temp_path)?;
            temp.write_all(data)?;
            temp.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;
        sync_parent(&self.path)?;

        *self.file.get_mut() = open_rw(&self.path)?;
        self.size = data.len() as u64;
        Ok(())
    }
}

fn open_rw(path: &Path) -> StorageResult<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> StorageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> StorageResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("default.realm");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
        assert_eq!(backend.path(), path);
    }

    #[test]
    fn contents_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("default.realm");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"first").unwrap();
            backend.append(b"second").unwrap();
            backend.sync().unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 11);
        assert_eq!(backend.read_at(5, 6).unwrap(), b"second");
    }

    #[test]
    fn exclusive_lock_rejects_second_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("default.realm");

        let first = FileBackend::open_exclusive(&path).unwrap();
        assert!(matches!(
            FileBackend::open_exclusive(&path),
            Err(StorageError::Locked { .. })
        ));

        drop(first);
        assert!(FileBackend::open_exclusive(&path).is_ok());
    }

    #[test]
    fn replace_then_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("default.realm");

        let mut backend = FileBackend::open_exclusive(&path).unwrap();
        backend.append(b"old old old").unwrap();
        backend.replace(b"new").unwrap();
        assert_eq!(backend.append(b"+").unwrap(), 3);
        drop(backend);

        assert_eq!(fs::read(&path).unwrap(), b"new+");
        assert!(!sidecar(&path, TEMP_SUFFIX).exists());
    }

    #[test]
    fn truncate_drops_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("default.realm");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"keep|drop").unwrap();
        backend.truncate(4).unwrap();
        assert_eq!(backend.read_from(0).unwrap(), b"keep");
        assert!(backend.read_at(2, 5).is_err());
    }
}
