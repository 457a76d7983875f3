use log::{debug, info};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::storage_interface::*;

/// The currently open file and what we know about it.
struct OpenFile {
    name: String,
    file: File,
    len: u64,
    position: u64,
}

/// A block store backed by a directory on the host filesystem. The directory
/// plays the part of the memory card: mounting checks it is present, and each
/// file inside it is a file on the card.
pub struct DirBlockStore {
    root: PathBuf,
    mounted: bool,
    current: Option<OpenFile>,
}

impl DirBlockStore {
    /// Create a store on the given directory. Nothing is touched until mount.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirBlockStore {
            root: root.into(),
            mounted: false,
            current: None,
        }
    }

    fn current(&mut self) -> FsResult<&mut OpenFile> {
        if !self.mounted {
            return Err(FsError::NotEnabled);
        }
        self.current.as_mut().ok_or(FsError::NotOpened)
    }
}

impl BlockStore for DirBlockStore {
    fn mount(&mut self) -> FsResult<()> {
        self.current = None;
        self.mounted = false;
        let meta = fs::metadata(&self.root).map_err(|e| {
            debug!("Cannot mount '{}': {}", self.root.display(), e);
            FsError::NotReady
        })?;
        if !meta.is_dir() {
            debug!("Cannot mount '{}': not a directory.", self.root.display());
            return Err(FsError::NoFilesystem);
        }
        self.mounted = true;
        info!("Mounted volume '{}'.", self.root.display());
        Ok(())
    }

    fn open(&mut self, name: &str) -> FsResult<()> {
        if !self.mounted {
            return Err(FsError::NotEnabled);
        }
        self.current = None;
        let path = self.root.join(name);
        let meta = fs::metadata(&path)?;
        if !meta.is_file() {
            return Err(FsError::NoFile);
        }
        // Boot images may be read-only on the host; fall back to reading.
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => File::open(&path)?,
            Err(e) => return Err(e.into()),
        };
        debug!("Opened '{}' ({} bytes).", path.display(), meta.len());
        self.current = Some(OpenFile {
            name: name.to_string(),
            file,
            len: meta.len(),
            position: 0,
        });
        Ok(())
    }

    fn read_block(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        let current = self.current()?;
        let mut total = 0;
        while total < buf.len() {
            match current.file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Read error on '{}': {}", current.name, e);
                    return Err(e.into());
                }
            }
        }
        current.position += total as u64;
        Ok(total)
    }

    fn write_block(&mut self, buf: &[u8]) -> FsResult<usize> {
        let current = self.current()?;
        // Files are fixed-size: writes stop at the end of the file.
        let remaining = current.len.saturating_sub(current.position);
        let count = buf.len().min(remaining as usize);
        current.file.write_all(&buf[..count]).map_err(|e| {
            debug!("Write error on '{}': {}", current.name, e);
            FsError::from(e)
        })?;
        current.position += count as u64;
        Ok(count)
    }

    fn finalize(&mut self) -> FsResult<()> {
        let current = self.current()?;
        current.file.flush()?;
        Ok(())
    }

    fn seek(&mut self, block: u32) -> FsResult<()> {
        let current = self.current()?;
        let offset = (block as u64 * SECTOR_SIZE as u64).min(current.len);
        current.file.seek(SeekFrom::Start(offset))?;
        current.position = offset;
        Ok(())
    }
}

/// Create a zero-filled image of `size` bytes at `path`. Returns false without
/// touching anything if the path already exists.
pub fn create_disk_image(path: &Path, size: u64) -> io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.set_len(size)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::init_test_logging;

    /// A test fixture with a temp dir holding a single 4-sector file.
    struct StoreFixture {
        store: DirBlockStore,
        temp_dir: tempfile::TempDir,
    }

    impl StoreFixture {
        fn new() -> io::Result<Self> {
            init_test_logging();

            let temp_dir = tempfile::tempdir()?;
            let file = File::create(temp_dir.path().join("DS0N00.DSK"))?;
            file.set_len(4 * SECTOR_SIZE as u64)?;
            let mut store = DirBlockStore::new(temp_dir.path());
            store.mount().unwrap();
            Ok(StoreFixture { store, temp_dir })
        }
    }

    #[test]
    fn test_mount_missing_directory() {
        init_test_logging();
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = DirBlockStore::new(temp_dir.path().join("absent"));
        assert_eq!(store.mount(), Err(FsError::NotReady));
        assert_eq!(store.open("DS0N00.DSK"), Err(FsError::NotEnabled));
    }

    #[test]
    fn test_mount_plain_file() {
        init_test_logging();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("card");
        File::create(&path).unwrap();
        let mut store = DirBlockStore::new(&path);
        assert_eq!(store.mount(), Err(FsError::NoFilesystem));
    }

    #[test]
    fn test_open_errors() {
        let mut fixture = StoreFixture::new().unwrap();
        assert_eq!(fixture.store.open("DS0N01.DSK"), Err(FsError::NoFile));
        let mut buf = [0; CHUNK_SIZE];
        assert_eq!(fixture.store.read_block(&mut buf), Err(FsError::NotOpened));
        fs::create_dir(fixture.temp_dir.path().join("DIR")).unwrap();
        assert_eq!(fixture.store.open("DIR"), Err(FsError::NoFile));
    }

    #[test]
    fn test_chunked_write_read() {
        let mut fixture = StoreFixture::new().unwrap();
        fixture.store.open("DS0N00.DSK").unwrap();

        let data: Vec<u8> = (0..SECTOR_SIZE).map(|_| rand::random()).collect();
        fixture.store.seek(2).unwrap();
        for chunk in data.chunks(CHUNK_SIZE) {
            assert_eq!(fixture.store.write_block(chunk), Ok(CHUNK_SIZE));
        }
        fixture.store.finalize().unwrap();

        let raw = fs::read(fixture.temp_dir.path().join("DS0N00.DSK")).unwrap();
        assert_eq!(&raw[2 * SECTOR_SIZE..3 * SECTOR_SIZE], data.as_slice());
        assert!(raw[..2 * SECTOR_SIZE].iter().all(|&b| b == 0));

        fixture.store.seek(2).unwrap();
        let mut read_back = vec![0; SECTOR_SIZE];
        for chunk in read_back.chunks_mut(CHUNK_SIZE) {
            assert_eq!(fixture.store.read_block(chunk), Ok(CHUNK_SIZE));
        }
        assert_eq!(read_back, data);
    }

    #[test]
    fn test_file_cannot_grow() {
        let mut fixture = StoreFixture::new().unwrap();
        fixture.store.open("DS0N00.DSK").unwrap();

        // Seeking past the end clips to the end of the file.
        fixture.store.seek(10).unwrap();
        assert_eq!(fixture.store.write_block(&[1; CHUNK_SIZE]), Ok(0));
        let mut buf = [0; CHUNK_SIZE];
        assert_eq!(fixture.store.read_block(&mut buf), Ok(0));
        let meta = fs::metadata(fixture.temp_dir.path().join("DS0N00.DSK")).unwrap();
        assert_eq!(meta.len(), 4 * SECTOR_SIZE as u64);
    }

    #[test]
    fn test_remount_closes_file() {
        let mut fixture = StoreFixture::new().unwrap();
        fixture.store.open("DS0N00.DSK").unwrap();
        fixture.store.mount().unwrap();
        assert_eq!(fixture.store.seek(0), Err(FsError::NotOpened));
    }

    #[test]
    fn test_create_disk_image() {
        init_test_logging();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("DS1N03.DSK");
        assert!(create_disk_image(&path, 3 * SECTOR_SIZE as u64).unwrap());
        assert_eq!(fs::metadata(&path).unwrap().len(), 3 * SECTOR_SIZE as u64);

        // A second call leaves the existing image alone.
        fs::write(&path, [7; 10]).unwrap();
        assert!(!create_disk_image(&path, 3 * SECTOR_SIZE as u64).unwrap());
        assert_eq!(fs::read(&path).unwrap(), vec![7; 10]);
    }
}
