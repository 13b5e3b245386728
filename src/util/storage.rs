//! # Fixed-record binary value store.
//!
//! [`FileStorage`] keeps little-endian `u64` values in 8-byte slots of a single
//! file, addressed by slot index.
//!
//! ```text
//! slot:    0          1          2
//! bytes: [0 ..  8)  [8 .. 16)  [16 .. 24)   ...
//! ```
//!
//! Reading a slot past the end of the file yields 0. Writing past the end
//! extends the file; the gap reads as zeros.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

const SLOT: u64 = 8;

/// # Errors produced by [`FileStorage`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StorageError {
    /// `open` called twice without `close`.
    #[error("storage {0} is already open")]
    AlreadyOpen(PathBuf),

    /// Read/write/clean before `open`.
    #[error("storage {0} is not open")]
    NotOpen(PathBuf),

    /// The slot index has no addressable byte offset.
    #[error("storage slot {0} is out of range")]
    OffsetOverflow(u64),

    /// Underlying file I/O failed.
    #[error("storage i/o failed: {0}")]
    Io(#[from] io::Error),
}

/// File-backed array of `u64` values.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    file: Option<File>,
}

impl FileStorage {
    /// Creates a closed store backed by `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True between `open` and `close`.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Opens the backing file, creating it when missing.
    pub fn open(&mut self) -> Result<(), StorageError> {
        if self.file.is_some() {
            return Err(StorageError::AlreadyOpen(self.path.clone()));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        self.file = Some(file);
        Ok(())
    }

    /// Flushes and closes the file. Closing a closed store is a no-op.
    pub fn close(&mut self) -> Result<(), StorageError> {
        match self.file.take() {
            Some(file) => Ok(file.sync_all()?),
            None => Ok(()),
        }
    }

    /// Writes `value` into slot `index`.
    pub fn set(&mut self, index: u64, value: u64) -> Result<(), StorageError> {
        let offset = offset_of(index)?;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    /// Reads slot `index`; 0 when the slot lies past the end of the file.
    pub fn get(&mut self, index: u64) -> Result<u64, StorageError> {
        let offset = offset_of(index)?;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = [0u8; SLOT as usize];
        match file.read_exact(&mut buf) {
            Ok(()) => Ok(u64::from_le_bytes(buf)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Truncates the store to zero slots.
    pub fn clean(&mut self) -> Result<(), StorageError> {
        let file = self.file_mut()?;
        file.set_len(0)?;
        file.rewind()?;
        Ok(())
    }

    fn file_mut(&mut self) -> Result<&mut File, StorageError> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(StorageError::NotOpen(self.path.clone())),
        }
    }
}

fn offset_of(index: u64) -> Result<u64, StorageError> {
    index
        .checked_mul(SLOT)
        .ok_or(StorageError::OffsetOverflow(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counters.bin");

        let mut store = FileStorage::new(&path);
        store.open().unwrap();
        store.set(0, 42).unwrap();
        store.set(3, u64::MAX).unwrap();
        store.close().unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 32);

        let mut store = FileStorage::new(&path);
        store.open().unwrap();
        assert_eq!(store.get(0).unwrap(), 42);
        assert_eq!(store.get(1).unwrap(), 0);
        assert_eq!(store.get(3).unwrap(), u64::MAX);
        assert_eq!(store.get(100).unwrap(), 0);
    }

    #[test]
    fn slots_are_little_endian() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut store = FileStorage::new(file.path());
        store.open().unwrap();
        store.set(1, 0x0102).unwrap();
        store.close().unwrap();

        let bytes = std::fs::read(file.path()).unwrap();
        assert_eq!(&bytes[8..10], &[0x02, 0x01]);
    }

    #[test]
    fn clean_truncates() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut store = FileStorage::new(file.path());
        store.open().unwrap();
        store.set(2, 7).unwrap();
        store.clean().unwrap();
        assert_eq!(store.get(2).unwrap(), 0);
        assert_eq!(std::fs::metadata(file.path()).unwrap().len(), 0);
    }

    #[test]
    fn closed_store_rejects_access() {
        let mut store = FileStorage::new("/nonexistent/never-opened.bin");
        assert!(matches!(store.get(0), Err(StorageError::NotOpen(_))));
        assert!(matches!(store.set(0, 1), Err(StorageError::NotOpen(_))));
        assert!(store.close().is_ok());
    }

    #[test]
    fn huge_index_is_rejected_without_touching_slot_zero() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut store = FileStorage::new(file.path());
        store.open().unwrap();
        store.set(0, 7).unwrap();

        let index = 1u64 << 61;
        assert!(matches!(store.set(index, 99), Err(StorageError::OffsetOverflow(i)) if i == index));
        assert!(matches!(store.get(u64::MAX), Err(StorageError::OffsetOverflow(_))));
        assert_eq!(store.get(0).unwrap(), 7);
    }

    #[test]
    fn double_open_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut store = FileStorage::new(file.path());
        store.open().unwrap();
        assert!(matches!(store.open(), Err(StorageError::AlreadyOpen(_))));
    }
}
