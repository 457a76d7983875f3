use log::trace;

use crate::disk::DiskEmulator;
use crate::opcodes::OP_NOP;
use crate::settings::BiosSettings;
use crate::signals::{ControlLine, SignalLines};
use crate::storage::BlockStore;

/// The single stored-opcode slot and the position within its byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredOpCode {
    opcode: u8,
    byte_count: u16,
}

impl StoredOpCode {
    pub fn new() -> Self {
        StoredOpCode {
            opcode: OP_NOP,
            byte_count: 0,
        }
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn byte_count(&self) -> u16 {
        self.byte_count
    }

    /// Store a new opcode. The counter always restarts.
    pub fn store(&mut self, opcode: u8) {
        trace!("Stored opcode {:#04x}.", opcode);
        self.opcode = opcode;
        self.byte_count = 0;
    }

    /// Return to NOP.
    pub fn reset(&mut self) {
        self.store(OP_NOP);
    }

    pub fn advance(&mut self) {
        self.byte_count = self.byte_count.wrapping_add(1);
    }
}

impl Default for StoredOpCode {
    fn default() -> Self {
        Self::new()
    }
}

// IRQ status bits.
pub const IRQ_SERIAL_RX: u8 = 0b01;
pub const IRQ_SYSTEM_TICK: u8 = 0b10;

/// Default system tick period in milliseconds.
pub const DEFAULT_TICK_INTERVAL: u64 = 100;

/// Interrupt enables, pending status and the system tick timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrqRegister {
    enables: u8,
    status: u8,
    tick_interval: u64,
    last_tick: u64,
}

impl IrqRegister {
    pub fn new() -> Self {
        IrqRegister {
            enables: 0,
            status: 0,
            tick_interval: DEFAULT_TICK_INTERVAL,
            last_tick: 0,
        }
    }

    pub fn set_enables(&mut self, mask: u8) {
        self.enables = mask & (IRQ_SERIAL_RX | IRQ_SYSTEM_TICK);
    }

    pub fn serial_rx_enabled(&self) -> bool {
        self.enables & IRQ_SERIAL_RX != 0
    }

    pub fn tick_enabled(&self) -> bool {
        self.enables & IRQ_SYSTEM_TICK != 0
    }

    pub fn tick_interval(&self) -> u64 {
        self.tick_interval
    }

    /// A zero interval is ignored.
    pub fn set_tick_interval(&mut self, millis: u8) {
        if millis > 0 {
            self.tick_interval = millis as u64;
        }
    }

    /// Has more than one interval passed since the last tick? If so, the
    /// tick is recorded as happening at `now`.
    pub fn tick_due(&mut self, now: u64) -> bool {
        if now.saturating_sub(self.last_tick) > self.tick_interval {
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    pub fn raise(&mut self, bits: u8) {
        self.status |= bits;
    }

    /// Read and clear the pending status.
    pub fn take_status(&mut self) -> u8 {
        std::mem::take(&mut self.status)
    }
}

impl Default for IrqRegister {
    fn default() -> Self {
        Self::new()
    }
}

/// The three OS memory banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryBank {
    Os0,
    Os1,
    Os2,
}

impl MemoryBank {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(MemoryBank::Os0),
            1 => Some(MemoryBank::Os1),
            2 => Some(MemoryBank::Os2),
            _ => None,
        }
    }

    /// Drive the bank select lines. Both lines are set in one step with no
    /// intermediate bank.
    pub fn apply(self, signals: &mut impl SignalLines) {
        let (bank1, bank0) = match self {
            MemoryBank::Os0 => (false, true),
            MemoryBank::Os1 => (true, true),
            MemoryBank::Os2 => (true, false),
        };
        signals.set_line(ControlLine::Bank1, bank1);
        signals.set_line(ControlLine::Bank0, bank0);
    }
}

/// All the mutable controller state shared by the engine and the
/// dispatcher.
pub struct BusControllerState<B> {
    pub opcode: StoredOpCode,
    pub irq: IrqRegister,
    pub disk: DiskEmulator<B>,
    pub bank: MemoryBank,
    /// Low byte of a track number whose high byte has not arrived yet.
    pub track_low: u8,
    pub last_rx_empty: bool,
    pub autoexec: bool,
}

impl<B: BlockStore> BusControllerState<B> {
    pub fn new(store: B, settings: &BiosSettings) -> Self {
        BusControllerState {
            opcode: StoredOpCode::new(),
            irq: IrqRegister::new(),
            disk: DiskEmulator::new(store, settings.disk_set),
            bank: MemoryBank::Os0,
            track_low: 0,
            last_rx_empty: false,
            autoexec: settings.autoexec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::signals::{SignalEvent, VirtualBus};

    #[test]
    fn test_store_resets_count() {
        let mut op = StoredOpCode::new();
        assert_eq!(op.opcode(), OP_NOP);
        op.store(0x0A);
        op.advance();
        assert_eq!(op.byte_count(), 1);
        op.store(0x0B);
        assert_eq!((op.opcode(), op.byte_count()), (0x0B, 0));
        op.advance();
        op.reset();
        assert_eq!((op.opcode(), op.byte_count()), (OP_NOP, 0));
    }

    #[test]
    fn test_tick_interval() {
        let mut irq = IrqRegister::new();
        assert_eq!(irq.tick_interval(), DEFAULT_TICK_INTERVAL);
        irq.set_tick_interval(0);
        assert_eq!(irq.tick_interval(), DEFAULT_TICK_INTERVAL);
        irq.set_tick_interval(20);
        assert!(!irq.tick_due(20));
        assert!(irq.tick_due(21));
        assert!(!irq.tick_due(41));
        assert!(irq.tick_due(42));
    }

    #[test]
    fn test_status_cleared_on_take() {
        let mut irq = IrqRegister::new();
        irq.set_enables(0xFF);
        assert!(irq.serial_rx_enabled() && irq.tick_enabled());
        irq.raise(IRQ_SYSTEM_TICK);
        irq.raise(IRQ_SERIAL_RX);
        assert_eq!(irq.take_status(), 0b11);
        assert_eq!(irq.take_status(), 0);
    }

    #[test]
    fn test_bank_lines() {
        assert_eq!(MemoryBank::from_id(3), None);
        let mut bus = VirtualBus::recording();
        for (id, bank1, bank0) in [(0, false, true), (1, true, true), (2, true, false)] {
            MemoryBank::from_id(id).unwrap().apply(&mut bus);
            assert_eq!(bus.take_events(), vec![
                SignalEvent::Line(ControlLine::Bank1, bank1),
                SignalEvent::Line(ControlLine::Bank0, bank0),
            ]);
        }
    }
}
