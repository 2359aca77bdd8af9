//! Storage backend trait definition.

use crate::error::StorageResult;

/// An append-only byte log.
///
/// Backends do not interpret what they store. Offsets returned by
/// [`append`](StorageBackend::append) stay valid for the lifetime of the log,
/// unless a later [`truncate`](StorageBackend::truncate) cuts them off.
///
/// # Invariants
///
/// - `append` returns the offset of the first appended byte
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - after `sync` returns, every appended byte survives process termination
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`](crate::StorageError::ReadPastEnd)
    /// if the range is not fully inside the log.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    fn flush(&mut self) -> StorageResult<()>;

    /// Makes every appended byte durable.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the log size in bytes (the offset of the next append).
    fn size(&self) -> StorageResult<u64>;

    /// Cuts the log down to `new_size` bytes.
    ///
    /// Recovery uses this to drop a torn record at the tail.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Reads the whole log.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        self.read_at(0, usize::try_from(size).unwrap_or(usize::MAX))
    }
}
