mod disk;
mod dispatch;
mod engine;
mod hexdump;
mod loader;
mod opcodes;
mod peripherals;
mod settings;
mod signals;
mod state;
mod storage;

pub use crate::disk::{disk_file_name, disk_name, DiskEmulator, DISK_IMAGE_SIZE, MAX_DISK_NUM,
                      MAX_DISK_SETS, MAX_SECTORS, MAX_TRACKS};
pub use crate::dispatch::{OpCodeDispatcher, FLAG_AUTOEXEC, FLAG_LAST_RX_EMPTY, FLAG_RTC_PRESENT,
                          FLAG_SERIAL_AVAILABLE};
pub use crate::engine::{BusPhase, BusProtocolEngine, BusTransaction, HostTicks, TickSource};
pub use crate::hexdump::hex_dump;
pub use crate::loader::{boot_image, BootError, BootImage, BootSource, MemoryLoader};
pub use crate::peripherals::{Absent, DateTime, ExpansionBus, GpioExpander, GpioRegister, HostClock,
                             LoggedSpeaker, ParallelPort, Peripherals, RtcClock, SerialConsole,
                             SerialPort, Speaker, SERIAL_TX_BUFFER};
pub use crate::settings::{BiosSettings, BootMode, ClockMode};
pub use crate::state::{BusControllerState, IrqRegister, MemoryBank, StoredOpCode, IRQ_SERIAL_RX,
                       IRQ_SYSTEM_TICK};
pub use crate::signals::{BusDirection, ControlLine, SignalEvent, SignalLines, VirtualBus};
pub use crate::storage::{create_disk_image, BlockStore, DirBlockStore, FsError, FsResult,
                         MemoryBlockStore, StoreStats, CHUNK_SIZE, SECTOR_SIZE};

/// Initialise logging for tests.
#[cfg(test)]
pub fn init_test_logging() {
    use simplelog::{Config, LevelFilter, TestLogger};

    // The logger can only be initialised once, but we don't know the order of
    // tests. Therefore we ignore the result.
    let _ = TestLogger::init(LevelFilter::Trace, Config::default());
}
