use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs4::FileExt;
use thiserror::Error;
use tracing::debug;

/// Lock acquisition mode for a blob file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    /// Shared advisory lock: excludes exclusive lockers only, other readers
    /// proceed concurrently.
    Shared,
    /// Exclusive advisory lock: excludes all cooperating readers and writers.
    Exclusive,
}

/// Errors surfaced while acquiring or using a blob lock.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O on locked file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Scoped advisory lock over a single blob file.
///
/// The lock is advisory: it only excludes participants that acquire their
/// own `BlobLock` on the same path. It is released when the guard drops,
/// on every exit path.
#[derive(Debug)]
pub struct BlobLock {
    file: File,
    path: PathBuf,
}

impl BlobLock {
    /// Open `path` and block until the requested advisory lock is granted.
    ///
    /// `Exclusive` creates the file and any missing parent directories;
    /// `Shared` requires the file to exist.
    pub fn acquire(path: &Path, mode: LockMode) -> Result<Self, LockError> {
        let open = |path: &Path| match mode {
            LockMode::Exclusive => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                OpenOptions::new()
                    .create(true)
                    .read(true)
                    .write(true)
                    .open(path)
            }
            LockMode::Shared => OpenOptions::new().read(true).open(path),
        };

        let file = open(path).map_err(|source| LockError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        match mode {
            LockMode::Exclusive => file.lock_exclusive(),
            LockMode::Shared => file.lock_shared(),
        }
        .map_err(|source| LockError::Lock {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), ?mode, "acquired blob lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole blob from the start.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>, LockError> {
        let mut buf = Vec::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_end(&mut buf))
            .map_err(|source| self.io_error(source))?;
        Ok(buf)
    }

    /// Replace the blob contents and flush them to disk.
    ///
    /// Truncation happens here, after the exclusive lock is already held,
    /// so readers cooperating through `BlobLock` never observe a partial
    /// document.
    pub fn replace_contents(&mut self, bytes: &[u8]) -> Result<(), LockError> {
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.set_len(0))
            .and_then(|_| self.file.write_all(bytes))
            .and_then(|_| self.file.sync_all())
            .map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> LockError {
        LockError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Drop for BlobLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn exclusive_write_then_shared_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peptide/ACDE.json");

        {
            let mut lock = BlobLock::acquire(&path, LockMode::Exclusive).unwrap();
            lock.replace_contents(b"{\"sequence\":\"ACDE\"}").unwrap();
        }

        let mut lock = BlobLock::acquire(&path, LockMode::Shared).unwrap();
        assert_eq!(lock.read_to_end().unwrap(), b"{\"sequence\":\"ACDE\"}");
    }

    #[test]
    fn exclusive_creates_missing_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c/blob.json");
        let _lock = BlobLock::acquire(&path, LockMode::Exclusive).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn shared_on_missing_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = BlobLock::acquire(&path, LockMode::Shared).unwrap_err();
        assert!(matches!(err, LockError::Open { .. }));
    }

    #[test]
    fn replace_overwrites_longer_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.json");

        let mut lock = BlobLock::acquire(&path, LockMode::Exclusive).unwrap();
        lock.replace_contents(b"a long first version of the document")
            .unwrap();
        lock.replace_contents(b"short").unwrap();
        assert_eq!(lock.read_to_end().unwrap(), b"short");
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.json");

        drop(BlobLock::acquire(&path, LockMode::Exclusive).unwrap());
        // A second exclusive acquisition must not block forever.
        let _again = BlobLock::acquire(&path, LockMode::Exclusive).unwrap();
    }

    #[test]
    fn concurrent_writers_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contended.json");

        // Seed the file so every participant opens the same inode.
        BlobLock::acquire(&path, LockMode::Exclusive)
            .unwrap()
            .replace_contents(b"seed")
            .unwrap();

        let doc_a = vec![b'a'; 256 * 1024];
        let doc_b = vec![b'b'; 256 * 1024];

        let writers: Vec<_> = [doc_a.clone(), doc_b.clone()]
            .into_iter()
            .map(|doc| {
                let path = path.clone();
                thread::spawn(move || {
                    let mut lock = BlobLock::acquire(&path, LockMode::Exclusive).unwrap();
                    // Widen the race window: a partial write, a pause,
                    // then the full document.
                    let (first_half, _) = doc.split_at(doc.len() / 2);
                    lock.replace_contents(first_half).unwrap();
                    thread::sleep(Duration::from_millis(20));
                    lock.replace_contents(&doc).unwrap();
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }

        let mut reader = BlobLock::acquire(&path, LockMode::Shared).unwrap();
        let contents = reader.read_to_end().unwrap();
        assert!(
            contents == doc_a || contents == doc_b,
            "reader observed an interleaved document"
        );
    }
}
