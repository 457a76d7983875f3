use log::{debug, info};
use std::error::Error;
use std::fmt;

use crate::disk::MAX_DISK_SETS;
use crate::settings::{BiosSettings, BootMode};
use crate::signals::{BusDirection, ControlLine, SignalLines};
use crate::storage::{BlockStore, FsError, CHUNK_SIZE};

// Host instructions injected while loading.
pub const LD_HL_NN: u8 = 0x21;
pub const LD_HL_N: u8 = 0x36;
pub const INC_HL: u8 = 0x23;
pub const JP_NN: u8 = 0xC3;

/// Size of the host address space.
pub const ADDRESS_SPACE: usize = 0x1_0000;

/// A boot program in the store, and where it goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootImage {
    pub file: &'static str,
    pub start: u16,
}

/// Boot loaders for each disk set, indexed by disk set.
const DISK_SET_LOADERS: [Option<BootImage>; MAX_DISK_SETS as usize] = [
    Some(BootImage { file: "CPM22.BIN", start: 0xD1E0 }),
    Some(BootImage { file: "QPMLDR.BIN", start: 0x0080 }),
    Some(BootImage { file: "CPMLDR.BIN", start: 0x0000 }),
    Some(BootImage { file: "UCSDLDR.BIN", start: 0x0000 }),
    Some(BootImage { file: "FUZIX.BIN", start: 0x0000 }),
    None,
];

/// The image in the store for a boot mode. None for modes without one.
pub fn boot_image(mode: BootMode, disk_set: u8) -> Option<BootImage> {
    match mode {
        BootMode::Basic => Some(BootImage { file: "BASIC47.BIN", start: 0x0000 }),
        BootMode::Forth => Some(BootImage { file: "FORTH13.BIN", start: 0x0100 }),
        BootMode::Auto => Some(BootImage { file: "AUTOBOOT.BIN", start: 0x0000 }),
        BootMode::OsOnDisk => DISK_SET_LOADERS.get(disk_set as usize).copied().flatten(),
        BootMode::ILoad => None,
    }
}

/// Where the boot program comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootSource {
    Store { file: String, start: u16 },
    Embedded { image: Vec<u8>, start: u16 },
}

impl BootSource {
    /// Choose the boot program for the given settings. `embedded` is the
    /// built-in image used by iLoad mode.
    pub fn for_settings(settings: &BiosSettings, embedded: Option<Vec<u8>>) -> Result<Self, BootError> {
        if settings.boot_mode == BootMode::ILoad {
            return match embedded {
                Some(image) => Ok(BootSource::Embedded { image, start: 0x0000 }),
                None => Err(BootError::NoBootImage { mode: settings.boot_mode, disk_set: settings.disk_set }),
            };
        }
        boot_image(settings.boot_mode, settings.disk_set)
            .map(|image| BootSource::Store { file: image.file.to_string(), start: image.start })
            .ok_or(BootError::NoBootImage { mode: settings.boot_mode, disk_set: settings.disk_set })
    }

    pub fn start(&self) -> u16 {
        match self {
            BootSource::Store { start, .. } | BootSource::Embedded { start, .. } => *start,
        }
    }
}

impl fmt::Display for BootSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootSource::Store { file, .. } => write!(f, "{}", file),
            BootSource::Embedded { image, .. } => write!(f, "built-in image ({} bytes)", image.len()),
        }
    }
}

/// Failures while loading the boot program. None of these are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootError {
    NoBootImage { mode: BootMode, disk_set: u8 },
    Storage { file: String, error: FsError },
    ImageTooLarge { start: u16 },
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::NoBootImage { mode, disk_set } =>
                write!(f, "No boot image for {} on disk set {}", mode, disk_set),
            BootError::Storage { file, error } =>
                write!(f, "Cannot load {}: {}", file, error),
            BootError::ImageTooLarge { start } =>
                write!(f, "Boot image loaded at {:#06x} runs past the end of memory", start),
        }
    }
}

impl Error for BootError {}

/// Pushes bytes into host memory by feeding it instructions one clock at a
/// time, while the host runs with no memory behind the data bus.
pub struct MemoryLoader<'a, S> {
    signals: &'a mut S,
}

impl<'a, S: SignalLines> MemoryLoader<'a, S> {
    pub fn new(signals: &'a mut S) -> Self {
        MemoryLoader { signals }
    }

    fn drive(&mut self, value: u8) {
        self.signals.set_data_bus_direction(BusDirection::Output);
        self.signals.write_data_bus(value);
    }

    fn float(&mut self) {
        self.signals.set_data_bus_direction(BusDirection::Input);
    }

    /// Execute `LD HL, address`.
    pub fn write_address_register(&mut self, address: u16) {
        let [low, high] = address.to_le_bytes();
        self.signals.pulse_clock(2);
        self.drive(LD_HL_NN);
        self.signals.pulse_clock(2);
        self.float();
        self.signals.pulse_clock(2);
        self.drive(low);
        self.signals.pulse_clock(1);
        self.float();
        self.signals.pulse_clock(2);
        self.drive(high);
        self.signals.pulse_clock(1);
        self.float();
    }

    /// Execute `LD (HL), value` then `INC HL`.
    pub fn write_byte(&mut self, value: u8) {
        self.signals.pulse_clock(2);
        self.drive(LD_HL_N);
        self.signals.pulse_clock(2);
        self.float();
        self.signals.pulse_clock(2);
        self.drive(value);
        self.signals.pulse_clock(1);
        self.float();
        self.signals.pulse_clock(3);

        self.signals.pulse_clock(2);
        self.drive(INC_HL);
        self.signals.pulse_clock(2);
        self.float();
        self.signals.pulse_clock(2);
    }

    /// Load `image` at `start`. Returns the number of bytes loaded.
    pub fn load_image(&mut self, image: &[u8], start: u16) -> Result<usize, BootError> {
        if start as usize + image.len() > ADDRESS_SPACE {
            return Err(BootError::ImageTooLarge { start });
        }
        self.write_address_register(start);
        for &b in image {
            self.write_byte(b);
        }
        Ok(image.len())
    }

    /// Stream an open file from the store in chunks until a short read.
    fn load_from_store(&mut self, store: &mut impl BlockStore, file: &str, start: u16)
            -> Result<usize, BootError> {
        let storage_error = |error| BootError::Storage { file: file.to_string(), error };
        let mut buf = [0; CHUNK_SIZE];
        let mut total = 0;
        self.write_address_register(start);
        loop {
            let count = store.read_block(&mut buf).map_err(storage_error)?;
            if start as usize + total + count > ADDRESS_SPACE {
                return Err(BootError::ImageTooLarge { start });
            }
            for &b in &buf[..count] {
                self.write_byte(b);
            }
            total += count;
            if count < CHUNK_SIZE {
                return Ok(total);
            }
        }
    }

    /// Hold the host in reset for a few clocks, then let it go.
    pub fn reset_cpu(&mut self) {
        self.signals.set_line(ControlLine::Reset, true);
        self.signals.pulse_clock(6);
        self.signals.set_line(ControlLine::Reset, false);
        self.signals.pulse_clock(2);
    }

    /// Put `JP start` at address 0 so the host starts at the image.
    fn inject_jump(&mut self, start: u16) {
        let [low, high] = start.to_le_bytes();
        self.write_address_register(0x0000);
        self.write_byte(JP_NN);
        self.write_byte(low);
        self.write_byte(high);
    }

    /// Load the boot program and reset the host into it. Returns the number
    /// of image bytes loaded.
    pub fn boot(&mut self, source: &BootSource, store: &mut impl BlockStore) -> Result<usize, BootError> {
        let start = source.start();
        self.reset_cpu();
        if start != 0 {
            debug!("Injecting jump to {:#06x}.", start);
            self.inject_jump(start);
        }
        let loaded = match source {
            BootSource::Embedded { image, .. } => self.load_image(image, start)?,
            BootSource::Store { file, .. } => {
                let storage_error = |error| BootError::Storage { file: file.clone(), error };
                store.mount().map_err(storage_error)?;
                store.open(file).map_err(storage_error)?;
                self.load_from_store(store, file, start)?
            }
        };
        info!("Loaded {} bytes of {} at {:#06x}.", loaded, source, start);
        self.reset_cpu();
        Ok(loaded)
    }
}
