use log::{debug, trace};

use crate::opcodes::{lookup, Command, ReadCommand, WriteCommand};
use crate::peripherals::{GpioRegister, Peripherals, EXPANSION_SLOTS};
use crate::signals::{ControlLine, SignalLines};
use crate::state::{BusControllerState, MemoryBank};
use crate::storage::BlockStore;

// SYSFLG bits.
pub const FLAG_AUTOEXEC: u8 = 0b0001;
pub const FLAG_RTC_PRESENT: u8 = 0b0010;
pub const FLAG_SERIAL_AVAILABLE: u8 = 0b0100;
pub const FLAG_LAST_RX_EMPTY: u8 = 0b1000;

/// Number of bytes in a date/time read.
const DATE_TIME_BYTES: u16 = 7;

/// Routes Execute-phase exchanges to the handler of the stored opcode.
///
/// Handlers never fail: bad input lands in the disk error register or is
/// ignored, and reads always produce a byte. Multi-byte handlers advance the
/// byte counter themselves and return to NOP when their sequence ends.
pub struct OpCodeDispatcher {
    peripherals: Peripherals,
}

impl OpCodeDispatcher {
    pub fn new(peripherals: Peripherals) -> Self {
        OpCodeDispatcher { peripherals }
    }

    /// Execute the stored opcode with a payload byte from the host.
    pub fn execute_write<B: BlockStore>(&mut self,
                                        state: &mut BusControllerState<B>,
                                        signals: &mut impl SignalLines,
                                        payload: u8) {
        let command = match lookup(state.opcode.opcode()) {
            Command::Write(command) => command,
            other => {
                trace!("Write of {:#04x} ignored by {:?}.", payload, other);
                return;
            }
        };
        trace!("{:?} <- {:#04x}", command, payload);
        match command {
            WriteCommand::UserLed => signals.set_line(ControlLine::UserLed, payload & 1 != 0),
            WriteCommand::SerialTx => self.peripherals.serial.write_byte(payload),
            WriteCommand::GpioA => self.write_gpio(GpioRegister::GpioA, payload),
            WriteCommand::GpioB => self.write_gpio(GpioRegister::GpioB, payload),
            WriteCommand::IoDirA => self.write_gpio(GpioRegister::IoDirA, payload),
            WriteCommand::IoDirB => self.write_gpio(GpioRegister::IoDirB, payload),
            WriteCommand::PullUpA => self.write_gpio(GpioRegister::GpPuA, payload),
            WriteCommand::PullUpB => self.write_gpio(GpioRegister::GpPuB, payload),
            WriteCommand::SelectDisk => {
                state.disk.select_disk(payload);
            }
            WriteCommand::SelectTrack => {
                if state.opcode.byte_count() == 0 {
                    state.track_low = payload;
                    state.opcode.advance();
                } else {
                    let track = ((payload as u16) << 8) | state.track_low as u16;
                    state.disk.select_track(track);
                    state.opcode.reset();
                }
            }
            WriteCommand::SelectSector => {
                state.disk.select_sector(payload);
            }
            WriteCommand::WriteSector => {
                let (_, complete) = state.disk.write_sector_byte(state.opcode.byte_count(), payload);
                if complete {
                    state.opcode.reset();
                } else {
                    state.opcode.advance();
                }
            }
            WriteCommand::SetBank => match MemoryBank::from_id(payload) {
                Some(bank) => {
                    bank.apply(signals);
                    state.bank = bank;
                }
                None => debug!("Ignoring select of memory bank {}.", payload),
            },
            WriteCommand::SetIrq => state.irq.set_enables(payload),
            WriteCommand::SetTick => state.irq.set_tick_interval(payload),
            WriteCommand::InitParallel => {
                if self.peripherals.parallel.is_present() {
                    self.peripherals.parallel.init(payload & 1 != 0);
                }
            }
            WriteCommand::WriteParallel => {
                if self.peripherals.parallel.is_present() {
                    self.peripherals.parallel.write(payload);
                }
            }
            WriteCommand::Speaker => self.peripherals.speaker.set_tone(payload),
        }
    }

    fn write_gpio(&mut self, register: GpioRegister, value: u8) {
        if self.peripherals.gpio.is_present() {
            self.peripherals.gpio.write_register(register, value);
        }
    }

    fn read_gpio(&mut self, register: GpioRegister) -> u8 {
        if self.peripherals.gpio.is_present() {
            self.peripherals.gpio.read_register(register)
        } else {
            0
        }
    }

    /// Execute the stored opcode, producing the byte to hand to the host.
    pub fn execute_read<B: BlockStore>(&mut self,
                                       state: &mut BusControllerState<B>,
                                       signals: &mut impl SignalLines) -> u8 {
        let command = match lookup(state.opcode.opcode()) {
            Command::Read(command) => command,
            other => {
                trace!("Read answered with 0 by {:?}.", other);
                return 0;
            }
        };
        let value = match command {
            ReadCommand::UserKey => signals.read_user_key() as u8,
            ReadCommand::GpioA => self.read_gpio(GpioRegister::GpioA),
            ReadCommand::GpioB => self.read_gpio(GpioRegister::GpioB),
            ReadCommand::SystemFlags => self.system_flags(state),
            ReadCommand::DateTime => self.read_date_time(state),
            ReadCommand::DiskError => state.disk.last_error(),
            ReadCommand::ReadSector => {
                let (value, _, complete) = state.disk.read_sector_byte(state.opcode.byte_count());
                if complete {
                    state.opcode.reset();
                } else {
                    state.opcode.advance();
                }
                value
            }
            ReadCommand::Mount => state.disk.mount(),
            ReadCommand::TxFree => self.peripherals.serial.tx_free(),
            ReadCommand::IrqStatus => state.irq.take_status(),
            ReadCommand::ParallelStatus => {
                if self.peripherals.parallel.is_present() {
                    self.peripherals.parallel.status()
                } else {
                    0
                }
            }
            ReadCommand::Cards => {
                self.peripherals.expansion.present_cards() & ((1 << EXPANSION_SLOTS) - 1)
            }
        };
        trace!("{:?} -> {:#04x}", command, value);
        value
    }

    fn system_flags<B>(&mut self, state: &BusControllerState<B>) -> u8 {
        let mut flags = 0;
        if state.autoexec {
            flags |= FLAG_AUTOEXEC;
        }
        if self.peripherals.rtc.is_present() {
            flags |= FLAG_RTC_PRESENT;
        }
        if self.peripherals.serial.available() {
            flags |= FLAG_SERIAL_AVAILABLE;
        }
        if state.last_rx_empty {
            flags |= FLAG_LAST_RX_EMPTY;
        }
        flags
    }

    /// Seven fields, then a terminating 0 that returns the slot to NOP.
    /// The clock is only read on the first byte.
    fn read_date_time<B>(&mut self, state: &mut BusControllerState<B>) -> u8 {
        let position = state.opcode.byte_count();
        if position >= DATE_TIME_BYTES {
            state.opcode.reset();
            return 0;
        }
        let rtc = &mut self.peripherals.rtc;
        if !rtc.is_present() {
            state.opcode.advance();
            return 0;
        }
        if position == 0 {
            rtc.refresh();
        }
        state.opcode.advance();
        rtc.date_time().fields()[position as usize]
    }

    /// The fast serial read. Returns 0xFF when nothing was received.
    pub fn serial_read<B>(&mut self, state: &mut BusControllerState<B>) -> u8 {
        match self.peripherals.serial.read_byte() {
            Some(byte) => {
                state.last_rx_empty = false;
                byte
            }
            None => {
                state.last_rx_empty = true;
                0xFF
            }
        }
    }

    pub fn serial_pending(&mut self) -> bool {
        self.peripherals.serial.available()
    }
}
