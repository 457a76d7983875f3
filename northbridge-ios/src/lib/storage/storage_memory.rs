use std::collections::HashMap;

use super::storage_interface::*;

/// Counters of every storage access, so callers can check which operations
/// touched the medium.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub mounts: usize,
    pub opens: usize,
    pub seeks: usize,
    pub reads: usize,
    pub writes: usize,
    pub finalizes: usize,
}

impl StoreStats {
    /// Accesses that move data or the file position.
    pub fn data_accesses(&self) -> usize {
        self.seeks + self.reads + self.writes + self.finalizes
    }
}

/// A MemoryBlockStore is backed by memory instead of a real volume. Files are
/// fixed-size byte vectors; reads and writes stop at their end, exactly like
/// the real thing.
#[derive(Default)]
pub struct MemoryBlockStore {
    files: HashMap<String, Vec<u8>>,
    mounted: bool,
    mount_error: Option<FsError>,
    current: Option<String>,
    position: usize,
    last_opened: Option<String>,
    stats: StoreStats,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file with the given contents.
    pub fn with_file(mut self, name: &str, contents: Vec<u8>) -> Self {
        self.files.insert(name.to_string(), contents);
        self
    }

    /// Make every mount fail with the given error.
    pub fn with_mount_error(mut self, error: FsError) -> Self {
        self.mount_error = Some(error);
        self
    }

    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// The name passed to the most recent open call, successful or not.
    pub fn last_opened(&self) -> Option<&str> {
        self.last_opened.as_deref()
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    fn current_file(&mut self) -> FsResult<&mut Vec<u8>> {
        if !self.mounted {
            return Err(FsError::NotEnabled);
        }
        let name = self.current.as_ref().ok_or(FsError::NotOpened)?;
        self.files.get_mut(name).ok_or(FsError::DiskErr)
    }
}

impl BlockStore for MemoryBlockStore {
    fn mount(&mut self) -> FsResult<()> {
        self.stats.mounts += 1;
        self.current = None;
        if let Some(e) = self.mount_error {
            self.mounted = false;
            return Err(e);
        }
        self.mounted = true;
        Ok(())
    }

    fn open(&mut self, name: &str) -> FsResult<()> {
        self.stats.opens += 1;
        self.last_opened = Some(name.to_string());
        if !self.mounted {
            return Err(FsError::NotEnabled);
        }
        self.current = None;
        if !self.files.contains_key(name) {
            return Err(FsError::NoFile);
        }
        self.current = Some(name.to_string());
        self.position = 0;
        Ok(())
    }

    fn read_block(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        self.stats.reads += 1;
        let position = self.position;
        let file = self.current_file()?;
        let count = buf.len().min(file.len().saturating_sub(position));
        buf[..count].copy_from_slice(&file[position..position + count]);
        self.position += count;
        Ok(count)
    }

    fn write_block(&mut self, buf: &[u8]) -> FsResult<usize> {
        self.stats.writes += 1;
        let position = self.position;
        let file = self.current_file()?;
        let count = buf.len().min(file.len().saturating_sub(position));
        file[position..position + count].copy_from_slice(&buf[..count]);
        self.position += count;
        Ok(count)
    }

    fn finalize(&mut self) -> FsResult<()> {
        self.stats.finalizes += 1;
        self.current_file().map(|_| ())
    }

    fn seek(&mut self, block: u32) -> FsResult<()> {
        self.stats.seeks += 1;
        let len = self.current_file()?.len();
        self.position = (block as usize * SECTOR_SIZE).min(len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_mount_and_open() {
        let mut store = MemoryBlockStore::new().with_file("A", vec![0; SECTOR_SIZE]);
        assert_eq!(store.open("A"), Err(FsError::NotEnabled));
        store.mount().unwrap();
        assert_eq!(store.seek(0), Err(FsError::NotOpened));
        assert_eq!(store.open("B"), Err(FsError::NoFile));
        assert_eq!(store.last_opened(), Some("B"));
        store.open("A").unwrap();
        assert_eq!(store.seek(0), Ok(()));
    }

    #[test]
    fn test_short_transfers_at_end_of_file() {
        let mut store = MemoryBlockStore::new().with_file("A", vec![9; 40]);
        store.mount().unwrap();
        store.open("A").unwrap();
        let mut buf = [0; CHUNK_SIZE];
        assert_eq!(store.read_block(&mut buf), Ok(32));
        assert_eq!(store.read_block(&mut buf), Ok(8));
        assert_eq!(&buf[..8], &[9; 8]);
        store.seek(0).unwrap();
        assert_eq!(store.write_block(&[1; 64]), Ok(40));
        assert_eq!(store.file("A").unwrap(), &[1; 40][..]);
    }

    #[test]
    fn test_mount_error() {
        let mut store = MemoryBlockStore::new().with_mount_error(FsError::NotReady);
        assert_eq!(store.mount(), Err(FsError::NotReady));
        assert_eq!(store.stats().mounts, 1);
    }
}
