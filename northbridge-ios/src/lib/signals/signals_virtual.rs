use log::trace;
use std::collections::HashMap;

use super::signals_interface::*;

/// One primitive operation performed on the lines, as recorded by a
/// `VirtualBus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Direction(BusDirection),
    Drive(u8),
    Line(ControlLine, bool),
    Hold(u32),
    Pulse(u8),
}

/// A bus cycle the virtual host is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Write { address_bit: bool, data: u8 },
    Read { address_bit: bool },
    InterruptAck,
}

/// An in-process stand-in for the host side of the bus. The "host" presents
/// one cycle at a time and stays in its wait state until the controller pulses
/// the wait reset; on leaving a read cycle it latches whatever is being driven
/// onto the data bus at that moment, exactly like the real CPU would.
pub struct VirtualBus {
    pending: Option<Cycle>,
    latched: Option<u8>,
    direction: BusDirection,
    driven: u8,
    lines: HashMap<ControlLine, bool>,
    user_key: bool,
    clock_pulses: u64,
    events: Option<Vec<SignalEvent>>,
}

impl VirtualBus {
    /// A virtual bus with all lines deasserted.
    pub fn new() -> Self {
        VirtualBus {
            pending: None,
            latched: None,
            direction: BusDirection::Input,
            driven: 0xFF,
            lines: HashMap::new(),
            user_key: false,
            clock_pulses: 0,
            events: None,
        }
    }

    /// Like `new`, but every primitive operation is recorded.
    pub fn recording() -> Self {
        VirtualBus {
            events: Some(Vec::new()),
            ..Self::new()
        }
    }

    /// Start a host write cycle. A high address bit stores an opcode.
    pub fn present_write(&mut self, address_bit: bool, data: u8) {
        self.present(Cycle::Write { address_bit, data });
    }

    /// Start a host read cycle.
    pub fn present_read(&mut self, address_bit: bool) {
        self.present(Cycle::Read { address_bit });
    }

    /// Start an interrupt acknowledge cycle (wait asserted, no strobes).
    pub fn present_interrupt_ack(&mut self) {
        self.present(Cycle::InterruptAck);
    }

    fn present(&mut self, cycle: Cycle) {
        assert!(self.pending.is_none(), "host is already waiting on {:?}", self.pending);
        trace!("Virtual host presents {:?}.", cycle);
        self.latched = None;
        self.pending = Some(cycle);
    }

    /// Is the host still parked in its wait state?
    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    /// The byte the host latched when it left its last read cycle.
    pub fn take_latched(&mut self) -> Option<u8> {
        self.latched.take()
    }

    /// The current logical level of a control line.
    pub fn line(&self, line: ControlLine) -> bool {
        self.lines.get(&line).copied().unwrap_or(false)
    }

    pub fn direction(&self) -> BusDirection {
        self.direction
    }

    pub fn clock_pulses(&self) -> u64 {
        self.clock_pulses
    }

    pub fn set_user_key(&mut self, pressed: bool) {
        self.user_key = pressed;
    }

    /// Drain the recorded events. Empty if not recording.
    pub fn take_events(&mut self) -> Vec<SignalEvent> {
        match &mut self.events {
            Some(events) => std::mem::take(events),
            None => Vec::new(),
        }
    }

    fn record(&mut self, event: SignalEvent) {
        if let Some(events) = &mut self.events {
            events.push(event);
        }
    }

    /// The wait flip-flop has been reset: the host finishes its cycle.
    fn leave_wait_state(&mut self) {
        if let Some(Cycle::Read { .. }) = self.pending {
            self.latched = match self.direction {
                BusDirection::Output => Some(self.driven),
                BusDirection::Input => Some(0xFF),  // Pull-ups.
            };
        }
        self.pending = None;
    }
}

impl Default for VirtualBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalLines for VirtualBus {
    fn read_wait(&mut self) -> bool {
        self.pending.is_some()
    }

    fn read_write_strobe(&mut self) -> bool {
        matches!(self.pending, Some(Cycle::Write { .. }))
    }

    fn read_read_strobe(&mut self) -> bool {
        matches!(self.pending, Some(Cycle::Read { .. }))
    }

    fn read_address_bit_0(&mut self) -> bool {
        match self.pending {
            Some(Cycle::Write { address_bit, .. }) | Some(Cycle::Read { address_bit }) => address_bit,
            _ => false,
        }
    }

    fn read_user_key(&mut self) -> bool {
        self.user_key
    }

    fn read_data_bus(&mut self) -> u8 {
        match (self.direction, self.pending) {
            (BusDirection::Output, _) => self.driven,
            (BusDirection::Input, Some(Cycle::Write { data, .. })) => data,
            (BusDirection::Input, _) => 0xFF,
        }
    }

    fn write_data_bus(&mut self, value: u8) {
        self.record(SignalEvent::Drive(value));
        self.driven = value;
    }

    fn set_data_bus_direction(&mut self, direction: BusDirection) {
        self.record(SignalEvent::Direction(direction));
        self.direction = direction;
    }

    fn set_line(&mut self, line: ControlLine, asserted: bool) {
        self.record(SignalEvent::Line(line, asserted));
        self.lines.insert(line, asserted);
        if line == ControlLine::WaitReset && asserted {
            self.leave_wait_state();
        }
    }

    fn hold_micros(&mut self, micros: u32) {
        self.record(SignalEvent::Hold(micros));
    }

    fn pulse_clock(&mut self, count: u8) {
        self.record(SignalEvent::Pulse(count));
        self.clock_pulses += count as u64;
    }
}
