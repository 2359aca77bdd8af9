//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory append-only log.
///
/// Clones made with [`InMemoryBackend::share`] see the same bytes, which lets a
/// test drop a database and open it again from the "same disk".
///
/// ```rust
/// use nestdb_storage::{StorageBackend, InMemoryBackend};
///
/// let mut first = InMemoryBackend::new();
/// first.append(b"abc").unwrap();
/// let second = first.share();
/// assert_eq!(second.size().unwrap(), 3);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log holding `data`.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns a second handle onto the same bytes.
    #[must_use]
    pub fn share(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }

    /// Returns a copy of the stored bytes.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Flips every bit of the byte at `offset`.
    ///
    /// Simulates media corruption in recovery tests. Out-of-range offsets are ignored.
    pub fn corrupt_byte(&self, offset: u64) {
        let mut data = self.data.write();
        if let Some(byte) = usize::try_from(offset).ok().and_then(|i| data.get_mut(i)) {
            *byte = !*byte;
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = start.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[start..end].to_vec())
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        data.truncate(usize::try_from(new_size).unwrap_or(usize::MAX));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_returns_running_offsets() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"node").unwrap(), 0);
        assert_eq!(backend.append(b"commit").unwrap(), 4);
        assert_eq!(backend.size().unwrap(), 10);
        assert_eq!(backend.read_at(4, 6).unwrap(), b"commit");
    }

    #[test]
    fn read_past_end_is_rejected() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"abc").unwrap();
        assert!(matches!(
            backend.read_at(2, 5),
            Err(StorageError::ReadPastEnd { .. })
        ));
        assert!(matches!(
            backend.read_at(9, 0),
            Err(StorageError::ReadPastEnd { .. })
        ));
        assert!(backend.read_at(3, 0).unwrap().is_empty());
    }

    #[test]
    fn shared_handles_see_the_same_log() {
        let mut writer = InMemoryBackend::new();
        let reader = writer.share();
        writer.append(b"hello").unwrap();
        assert_eq!(reader.read_all().unwrap(), b"hello");
    }

    #[test]
    fn truncate_drops_the_tail() {
        let mut backend = InMemoryBackend::with_data(b"record-torn".to_vec());
        backend.truncate(6).unwrap();
        assert_eq!(backend.data(), b"record");
        assert!(matches!(
            backend.truncate(100),
            Err(StorageError::TruncateBeyondEnd { requested: 100, size: 6 })
        ));
    }

    #[test]
    fn corrupt_byte_flips_bits() {
        let backend = InMemoryBackend::with_data(vec![0x0f, 0x00]);
        backend.corrupt_byte(0);
        backend.corrupt_byte(42);
        assert_eq!(backend.data(), vec![0xf0, 0x00]);
    }
}
