use log::warn;
use std::fmt;

use crate::disk::MAX_DISK_SETS;

/// Host CPU clock speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    Fast = 0,
    Slow = 1,
}

impl ClockMode {
    pub fn megahertz(self) -> u8 {
        match self {
            ClockMode::Fast => 8,
            ClockMode::Slow => 4,
        }
    }
}

/// What gets loaded into memory before the host starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    Basic,
    Forth,
    OsOnDisk,
    Auto,
    ILoad,
}

impl fmt::Display for BootMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootMode::Basic => "BASIC",
            BootMode::Forth => "Forth",
            BootMode::OsOnDisk => "OS from disk",
            BootMode::Auto => "Autoboot",
            BootMode::ILoad => "iLoad",
        };
        f.write_str(name)
    }
}

/// The read-only settings the controller runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BiosSettings {
    pub clock_mode: ClockMode,
    pub disk_set: u8,
    pub autoexec: bool,
    pub boot_mode: BootMode,
}

impl BiosSettings {
    /// Build settings, falling back to disk set 0 if `disk_set` is out of
    /// range.
    pub fn new(clock_mode: ClockMode, disk_set: u8, autoexec: bool, boot_mode: BootMode) -> Self {
        let disk_set = if disk_set >= MAX_DISK_SETS {
            warn!("Disk set {} does not exist; using disk set 0.", disk_set);
            0
        } else {
            disk_set
        };
        BiosSettings {
            clock_mode,
            disk_set,
            autoexec,
            boot_mode,
        }
    }
}

impl Default for BiosSettings {
    fn default() -> Self {
        BiosSettings::new(ClockMode::Fast, 0, false, BootMode::Basic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_set_range() {
        for set in 0..MAX_DISK_SETS {
            assert_eq!(BiosSettings::new(ClockMode::Slow, set, true, BootMode::OsOnDisk).disk_set, set);
        }
        let settings = BiosSettings::new(ClockMode::Slow, MAX_DISK_SETS, true, BootMode::OsOnDisk);
        assert_eq!(settings.disk_set, 0);
        assert_eq!(settings.clock_mode, ClockMode::Slow);
        assert!(settings.autoexec);
    }

    #[test]
    fn test_clock_speeds() {
        assert_eq!(ClockMode::Fast.megahertz(), 8);
        assert_eq!(ClockMode::Slow.megahertz(), 4);
    }
}
