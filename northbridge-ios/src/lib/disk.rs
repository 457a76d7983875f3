use log::{debug, info, trace};

use crate::storage::{fs_code, BlockStore, CHUNK_SIZE, SECTOR_SIZE};

// Disk geometry.
pub const MAX_TRACKS: u16 = 512;
pub const MAX_SECTORS: u8 = 32;
pub const MAX_DISK_NUM: u8 = 99;
pub const MAX_DISK_SETS: u8 = 6;
pub const DISK_EXTENSION: &str = "DSK";
pub const DISK_IMAGE_SIZE: u64 = MAX_TRACKS as u64 * MAX_SECTORS as u64 * SECTOR_SIZE as u64;

/// Byte position at which a sector transfer is considered finished. This is
/// tied to the track count rather than the sector length; the two coincide
/// for a 512-track disk.
pub const TRANSFER_LAST_POSITION: u16 = MAX_TRACKS - 1;

// Disk error register values. 1-6 come from the storage layer.
pub const ERR_OK: u8 = 0;
pub const ERR_ILLEGAL_DISK: u8 = 16;
pub const ERR_ILLEGAL_TRACK: u8 = 17;
pub const ERR_ILLEGAL_SECTOR: u8 = 18;
pub const ERR_UNEXPECTED_EOF: u8 = 19;

/// The 6-character name of a virtual disk, e.g. `DS2N07`.
pub fn disk_name(disk_set: u8, disk_number: u8) -> String {
    format!("DS{}N{:02}", disk_set, disk_number)
}

/// The file holding a virtual disk, e.g. `DS2N07.DSK`.
pub fn disk_file_name(disk_set: u8, disk_number: u8) -> String {
    format!("{}.{}", disk_name(disk_set, disk_number), DISK_EXTENSION)
}

/// Compute the error code for a track/sector pair. An illegal sector wins
/// over an illegal track.
fn validate_address(track: u16, sector: u8) -> u8 {
    if sector >= MAX_SECTORS {
        ERR_ILLEGAL_SECTOR
    } else if track >= MAX_TRACKS {
        ERR_ILLEGAL_TRACK
    } else {
        ERR_OK
    }
}

/// Presents files in a block store as track/sector addressed disks, one byte
/// at a time. The error register is sticky: it is only ever replaced by the
/// next disk operation, and a latched error turns every following transfer
/// byte into a no-op.
pub struct DiskEmulator<B> {
    store: B,
    disk_set: u8,
    track: u16,
    sector: u8,
    error: u8,
    buffer: [u8; SECTOR_SIZE],
}

impl<B: BlockStore> DiskEmulator<B> {
    pub fn new(store: B, disk_set: u8) -> Self {
        DiskEmulator {
            store,
            disk_set,
            track: 0,
            sector: 0,
            error: ERR_OK,
            buffer: [0; SECTOR_SIZE],
        }
    }

    pub fn store(&self) -> &B {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut B {
        &mut self.store
    }

    /// The disk error register. Reading does not clear it.
    pub fn last_error(&self) -> u8 {
        self.error
    }

    /// Mount the volume, returning the filesystem code. The disk error
    /// register is left alone.
    pub fn mount(&mut self) -> u8 {
        let code = fs_code(self.store.mount());
        if code == ERR_OK {
            info!("Volume mounted.");
        } else {
            debug!("Volume mount failed with code {}.", code);
        }
        code
    }

    /// Open disk `disk_number` of the current disk set.
    pub fn select_disk(&mut self, disk_number: u8) -> u8 {
        if disk_number > MAX_DISK_NUM {
            debug!("Illegal disk number {}.", disk_number);
            self.error = ERR_ILLEGAL_DISK;
            return self.error;
        }
        let name = disk_file_name(self.disk_set, disk_number);
        self.error = fs_code(self.store.open(&name));
        if self.error == ERR_OK {
            info!("Selected disk {}.", name);
        } else {
            debug!("Cannot open {}: code {}.", name, self.error);
        }
        self.error
    }

    pub fn select_track(&mut self, track: u16) -> u8 {
        self.track = track;
        self.error = validate_address(self.track, self.sector);
        trace!("Track {} selected, error {}.", track, self.error);
        self.error
    }

    pub fn select_sector(&mut self, sector: u8) -> u8 {
        self.sector = sector;
        self.error = validate_address(self.track, self.sector);
        trace!("Sector {} selected, error {}.", sector, self.error);
        self.error
    }

    fn logical_block(&self) -> u32 {
        ((self.track as u32) << 5) | self.sector as u32
    }

    /// Position the store at the selected sector, unless an error is latched.
    fn start_transfer(&mut self) {
        if self.error != ERR_OK {
            debug!("Transfer refused: error {} is latched.", self.error);
            return;
        }
        let block = self.logical_block();
        self.error = fs_code(self.store.seek(block));
        if self.error != ERR_OK {
            debug!("Seek to block {} failed with code {}.", block, self.error);
        }
    }

    /// Accept byte `position` of a sector write. Returns the error register
    /// and whether the transfer has finished.
    pub fn write_sector_byte(&mut self, position: u16, value: u8) -> (u8, bool) {
        if position == 0 {
            self.start_transfer();
        }
        if self.error == ERR_OK {
            let index = position as usize % SECTOR_SIZE;
            self.buffer[index] = value;
            if index % CHUNK_SIZE == CHUNK_SIZE - 1 {
                let start = index + 1 - CHUNK_SIZE;
                self.error = match self.store.write_block(&self.buffer[start..=index]) {
                    Ok(CHUNK_SIZE) => ERR_OK,
                    Ok(count) => {
                        debug!("Short write: {} of {} bytes.", count, CHUNK_SIZE);
                        ERR_UNEXPECTED_EOF
                    }
                    Err(e) => {
                        debug!("Write failed: {}.", e);
                        e.code()
                    }
                };
            }
        }
        let complete = position >= TRANSFER_LAST_POSITION;
        if complete && self.error == ERR_OK {
            self.error = fs_code(self.store.finalize());
        }
        (self.error, complete)
    }

    /// Produce byte `position` of a sector read. Returns the byte (zero on
    /// error), the error register, and whether the transfer has finished.
    pub fn read_sector_byte(&mut self, position: u16) -> (u8, u8, bool) {
        if position == 0 {
            self.start_transfer();
        }
        let mut value = 0;
        if self.error == ERR_OK {
            let index = position as usize % SECTOR_SIZE;
            if index % CHUNK_SIZE == 0 {
                let chunk = &mut self.buffer[index..index + CHUNK_SIZE];
                self.error = match self.store.read_block(chunk) {
                    Ok(CHUNK_SIZE) => ERR_OK,
                    Ok(count) => {
                        debug!("Short read: {} of {} bytes.", count, CHUNK_SIZE);
                        ERR_UNEXPECTED_EOF
                    }
                    Err(e) => {
                        debug!("Read failed: {}.", e);
                        e.code()
                    }
                };
            }
            if self.error == ERR_OK {
                value = self.buffer[index];
            }
        }
        (value, self.error, position >= TRANSFER_LAST_POSITION)
    }
}
