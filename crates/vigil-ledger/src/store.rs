//! Ledger storage backends.
//!
//! Records are opaque byte strings framed with a u32-LE length prefix.
//! [`MemoryStore`] backs tests; [`FileStore`] is the production append-only
//! file. Both detect and discard torn tail records on open, leaving the
//! log in a consistent prefix state after a crash.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use vigil_types::VigilError;

/// Iterator over `(offset, record)` pairs.
pub type ScanIter<'a> = Box<dyn Iterator<Item = Result<(u64, Vec<u8>), VigilError>> + 'a>;

/// Append-only record storage with crash-safe semantics.
pub trait LedgerStore: Send {
    /// Append one record, returning its offset.
    fn append(&mut self, record: &[u8]) -> Result<u64, VigilError>;

    /// Read the record starting at `offset`.
    fn read(&self, offset: u64) -> Result<Vec<u8>, VigilError>;

    /// Iterate every record in append order.
    fn scan(&self) -> Result<ScanIter<'_>, VigilError>;

    /// Make appended records durable.
    fn flush(&mut self) -> Result<(), VigilError>;
}

/// In-memory store for tests. Offsets are record indices.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl LedgerStore for MemoryStore {
    fn append(&mut self, record: &[u8]) -> Result<u64, VigilError> {
        self.records.push(record.to_vec());
        Ok((self.records.len() - 1) as u64)
    }

    fn read(&self, offset: u64) -> Result<Vec<u8>, VigilError> {
        self.records
            .get(offset as usize)
            .cloned()
            .ok_or_else(|| VigilError::Storage(format!("no record at offset {offset}")))
    }

    fn scan(&self) -> Result<ScanIter<'_>, VigilError> {
        Ok(Box::new(
            self.records
                .iter()
                .enumerate()
                .map(|(i, r)| Ok((i as u64, r.clone()))),
        ))
    }

    fn flush(&mut self) -> Result<(), VigilError> {
        Ok(())
    }
}

/// Append-only file store. Offsets are byte positions of the length prefix.
pub struct FileStore {
    path: PathBuf,
    file: File,
    end: u64,
}

impl FileStore {
    /// Open (or create) the log at `path`.
    ///
    /// Scans existing frames and truncates any torn tail (a short length
    /// prefix or a record body cut off mid-write), so the log always opens
    /// onto a consistent prefix.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VigilError> {
        let path = path.as_ref().to_path_buf();
        let end = Self::recover(&path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| VigilError::Storage(format!("open {}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), end, "ledger file opened");
        Ok(Self { path, file, end })
    }

    /// Walk frames from the start; truncate the file after the last whole
    /// frame and return the resulting end offset.
    fn recover(path: &Path) -> Result<u64, VigilError> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(VigilError::Storage(format!("open {}: {e}", path.display()))),
        };
        let len = file
            .metadata()
            .map_err(|e| VigilError::Storage(format!("stat {}: {e}", path.display())))?
            .len();

        let mut good_end = 0u64;
        let mut prefix = [0u8; 4];
        loop {
            match file.read_exact(&mut prefix) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(VigilError::Storage(format!("read frame prefix: {e}"))),
            }
            let record_len = u32::from_le_bytes(prefix) as u64;
            if good_end + 4 + record_len > len {
                break;
            }
            file.seek(SeekFrom::Current(record_len as i64))
                .map_err(|e| VigilError::Storage(format!("seek past record: {e}")))?;
            good_end += 4 + record_len;
        }

        if good_end < len {
            tracing::warn!(
                path = %path.display(),
                good_end,
                file_len = len,
                "discarding torn tail record"
            );
            let writable = OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|e| VigilError::Storage(format!("open for truncate: {e}")))?;
            writable
                .set_len(good_end)
                .map_err(|e| VigilError::Storage(format!("truncate: {e}")))?;
        }
        Ok(good_end)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_frame(file: &mut File) -> Result<Option<Vec<u8>>, VigilError> {
        let mut prefix = [0u8; 4];
        match file.read_exact(&mut prefix) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(VigilError::Storage(format!("read frame prefix: {e}"))),
        }
        let record_len = u32::from_le_bytes(prefix) as usize;
        let mut record = vec![0u8; record_len];
        file.read_exact(&mut record)
            .map_err(|e| VigilError::Storage(format!("read record body: {e}")))?;
        Ok(Some(record))
    }
}

impl LedgerStore for FileStore {
    fn append(&mut self, record: &[u8]) -> Result<u64, VigilError> {
        let offset = self.end;
        let prefix = (record.len() as u32).to_le_bytes();
        self.file
            .write_all(&prefix)
            .and_then(|()| self.file.write_all(record))
            .map_err(|e| VigilError::Storage(format!("append: {e}")))?;
        self.end += 4 + record.len() as u64;
        Ok(offset)
    }

    fn read(&self, offset: u64) -> Result<Vec<u8>, VigilError> {
        let mut file = File::open(&self.path)
            .map_err(|e| VigilError::Storage(format!("open for read: {e}")))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| VigilError::Storage(format!("seek to {offset}: {e}")))?;
        Self::read_frame(&mut file)?
            .ok_or_else(|| VigilError::Storage(format!("no record at offset {offset}")))
    }

    fn scan(&self) -> Result<ScanIter<'_>, VigilError> {
        // Collect up-front so the iterator borrows nothing mutable; the
        // log only grows, so the snapshot is a consistent prefix.
        let mut file = File::open(&self.path)
            .map_err(|e| VigilError::Storage(format!("open for scan: {e}")))?;
        let mut frames = Vec::new();
        let mut offset = 0u64;
        while offset < self.end {
            match Self::read_frame(&mut file)? {
                Some(record) => {
                    let record_end = offset + 4 + record.len() as u64;
                    frames.push((offset, record));
                    offset = record_end;
                }
                None => break,
            }
        }
        Ok(Box::new(frames.into_iter().map(Ok)))
    }

    fn flush(&mut self) -> Result<(), VigilError> {
        self.file
            .sync_data()
            .map_err(|e| VigilError::Storage(format!("sync: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        let a = store.append(b"first").unwrap();
        let b = store.append(b"second").unwrap();
        assert_eq!(store.read(a).unwrap(), b"first");
        assert_eq!(store.read(b).unwrap(), b"second");
        let all: Vec<_> = store.scan().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].1, b"second");
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let mut store = FileStore::open(&path).unwrap();
        let a = store.append(b"alpha").unwrap();
        let b = store.append(b"bravo-longer-record").unwrap();
        store.flush().unwrap();
        assert_eq!(store.read(a).unwrap(), b"alpha");
        assert_eq!(store.read(b).unwrap(), b"bravo-longer-record");
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        {
            let mut store = FileStore::open(&path).unwrap();
            store.append(b"one").unwrap();
            store.append(b"two").unwrap();
            store.flush().unwrap();
        }
        let store = FileStore::open(&path).unwrap();
        let all: Vec<_> = store.scan().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].1, b"one");
    }

    #[test]
    fn torn_tail_is_discarded_on_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        {
            let mut store = FileStore::open(&path).unwrap();
            store.append(b"complete record").unwrap();
            store.flush().unwrap();
        }
        // Simulate a crash mid-append: a frame whose body is cut short.
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&(100u32).to_le_bytes()).unwrap();
            file.write_all(b"only a few bytes").unwrap();
        }
        let store = FileStore::open(&path).unwrap();
        let all: Vec<_> = store.scan().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].1, b"complete record");
    }

    #[test]
    fn short_length_prefix_discarded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        {
            let mut store = FileStore::open(&path).unwrap();
            store.append(b"whole").unwrap();
            store.flush().unwrap();
        }
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[9u8, 0]).unwrap(); // two bytes of a prefix
        }
        let store = FileStore::open(&path).unwrap();
        let all: Vec<_> = store.scan().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn appends_after_recovery_continue_cleanly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        {
            let mut store = FileStore::open(&path).unwrap();
            store.append(b"keep").unwrap();
            store.flush().unwrap();
        }
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&(50u32).to_le_bytes()).unwrap();
            file.write_all(b"torn").unwrap();
        }
        let mut store = FileStore::open(&path).unwrap();
        store.append(b"after recovery").unwrap();
        store.flush().unwrap();
        let all: Vec<_> = store.scan().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].1, b"after recovery");
    }
}
