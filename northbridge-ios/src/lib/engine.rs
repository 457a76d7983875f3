
use log::{info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::dispatch::OpCodeDispatcher;
use crate::loader::{BootError, BootSource, MemoryLoader};
use crate::opcodes::lookup;
use crate::peripherals::Peripherals;
use crate::settings::BiosSettings;
use crate::signals::{BusDirection, ControlLine, SignalLines};
use crate::state::{BusControllerState, MemoryBank, IRQ_SERIAL_RX, IRQ_SYSTEM_TICK};
use crate::storage::BlockStore;

/// How long the byte stays on the bus after the wait state ends.
pub const READ_HOLD_MICROS: u32 = 2;

/// A millisecond clock for the system tick.
pub trait TickSource {
    fn now_millis(&self) -> u64;
}

/// Milliseconds since creation, from the host's monotonic clock.
pub struct HostTicks {
    epoch: Instant,
}

impl HostTicks {
    pub fn new() -> Self {
        HostTicks { epoch: Instant::now() }
    }
}

impl Default for HostTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for HostTicks {
    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// The role of one bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusPhase {
    Store,
    ExecuteWrite,
    ExecuteRead,
    Interrupt,
}

/// A serviced bus transaction. `data` is the byte that crossed the bus: the
/// byte written by the host, or the byte handed back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusTransaction {
    pub phase: BusPhase,
    pub address_bit: bool,
    pub data: u8,
}

/// The polling loop that services the host's I/O cycles.
pub struct BusProtocolEngine<S, B, T> {
    signals: S,
    state: BusControllerState<B>,
    dispatcher: OpCodeDispatcher,
    ticks: T,
}

impl<S: SignalLines, B: BlockStore, T: TickSource> BusProtocolEngine<S, B, T> {
    pub fn new(signals: S,
               store: B,
               peripherals: Peripherals,
               settings: &BiosSettings,
               ticks: T) -> Self {
        info!("Bus engine created: disk set {}, {} MHz, autoexec {}.",
              settings.disk_set, settings.clock_mode.megahertz(),
              if settings.autoexec { "on" } else { "off" });
        BusProtocolEngine {
            signals,
            state: BusControllerState::new(store, settings),
            dispatcher: OpCodeDispatcher::new(peripherals),
            ticks,
        }
    }

    pub fn signals(&self) -> &S {
        &self.signals
    }

    pub fn signals_mut(&mut self) -> &mut S {
        &mut self.signals
    }

    pub fn state(&self) -> &BusControllerState<B> {
        &self.state
    }

    /// Load the boot program into host memory and reset the host into it.
    pub fn boot(&mut self, source: &BootSource) -> Result<usize, BootError> {
        info!("Booting {}.", source);
        MemoryBank::Os0.apply(&mut self.signals);
        self.state.bank = MemoryBank::Os0;
        let store = self.state.disk.store_mut();
        MemoryLoader::new(&mut self.signals).boot(source, store)
    }

    /// One pass of the loop: service a pending transaction if there is one,
    /// then run the interrupt checks.
    pub fn poll(&mut self) -> Option<BusTransaction> {
        let transaction = if self.signals.read_wait() {
            Some(self.service())
        } else {
            None
        };
        self.check_serial_irq();
        self.check_system_tick();
        transaction
    }

    /// Poll until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) {
        info!("Bus engine running.");
        while !stop.load(Ordering::Relaxed) {
            self.poll();
        }
        info!("Bus engine stopped.");
    }

    fn service(&mut self) -> BusTransaction {
        let address_bit = self.signals.read_address_bit_0();
        let transaction = if self.signals.read_write_strobe() {
            let data = self.signals.read_data_bus();
            let phase = if address_bit {
                self.state.opcode.store(data);
                BusPhase::Store
            } else {
                let command = lookup(self.state.opcode.opcode());
                self.dispatcher.execute_write(&mut self.state, &mut self.signals, data);
                if !command.stays_armed_after_write() {
                    self.state.opcode.reset();
                }
                BusPhase::ExecuteWrite
            };
            self.release_after_write();
            BusTransaction { phase, address_bit, data }
        } else if self.signals.read_read_strobe() {
            let data = if address_bit {
                let byte = self.dispatcher.serial_read(&mut self.state);
                self.signals.set_line(ControlLine::Interrupt, false);
                byte
            } else {
                let command = lookup(self.state.opcode.opcode());
                let byte = self.dispatcher.execute_read(&mut self.state, &mut self.signals);
                if !command.stays_armed_after_read() {
                    self.state.opcode.reset();
                }
                byte
            };
            self.release_after_read(data);
            BusTransaction { phase: BusPhase::ExecuteRead, address_bit, data }
        } else {
            self.signals.set_line(ControlLine::Interrupt, false);
            self.release_after_write();
            BusTransaction { phase: BusPhase::Interrupt, address_bit, data: 0 }
        };
        trace!("{:?}", transaction);
        transaction
    }

    /// End the host's wait state after a write or interrupt acknowledge.
    fn release_after_write(&mut self) {
        self.signals.set_line(ControlLine::BusRequest, true);
        self.signals.set_line(ControlLine::WaitReset, true);
        self.signals.set_line(ControlLine::WaitReset, false);
        self.signals.set_line(ControlLine::BusRequest, false);
    }

    /// End the host's wait state after a read. The byte must be on the bus
    /// before the wait ends, and stay there until the host has latched it.
    fn release_after_read(&mut self, data: u8) {
        self.signals.set_data_bus_direction(BusDirection::Output);
        self.signals.write_data_bus(data);
        self.signals.set_line(ControlLine::BusRequest, true);
        self.signals.set_line(ControlLine::WaitReset, true);
        self.signals.hold_micros(READ_HOLD_MICROS);
        self.signals.set_data_bus_direction(BusDirection::Input);
        self.signals.set_line(ControlLine::WaitReset, false);
        self.signals.set_line(ControlLine::BusRequest, false);
    }

    fn check_serial_irq(&mut self) {
        if self.state.irq.serial_rx_enabled() && self.dispatcher.serial_pending() {
            self.signals.set_line(ControlLine::Interrupt, true);
            self.state.irq.raise(IRQ_SERIAL_RX);
        }
    }

    fn check_system_tick(&mut self) {
        if !self.state.irq.tick_enabled() {
            return;
        }
        if self.state.irq.tick_due(self.ticks.now_millis()) {
            trace!("System tick.");
            self.signals.set_line(ControlLine::Interrupt, true);
            self.state.irq.raise(IRQ_SYSTEM_TICK);
        }
    }
}
