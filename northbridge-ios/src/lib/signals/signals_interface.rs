/// Direction of the shared data bus, seen from the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusDirection {
    Input,
    Output,
}

/// Discrete lines driven by the controller. Levels are logical: asserting a
/// line puts it in its active state whatever its electrical polarity. For
/// `Clock`, `Bank0` and `Bank1`, asserted is electrically high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlLine {
    Reset,
    BusRequest,
    WaitReset,
    Interrupt,
    Clock,
    Bank0,
    Bank1,
    UserLed,
}

/// Raw access to the host bus and control lines.
pub trait SignalLines {
    /// Is the host parked in a wait state?
    fn read_wait(&mut self) -> bool;
    fn read_write_strobe(&mut self) -> bool;
    fn read_read_strobe(&mut self) -> bool;
    fn read_address_bit_0(&mut self) -> bool;
    fn read_user_key(&mut self) -> bool;

    fn read_data_bus(&mut self) -> u8;
    fn write_data_bus(&mut self, value: u8);
    fn set_data_bus_direction(&mut self, direction: BusDirection);

    fn set_line(&mut self, line: ControlLine, asserted: bool);

    /// Busy-wait for the given number of microseconds.
    fn hold_micros(&mut self, micros: u32);

    /// Run `count` full host clock cycles.
    fn pulse_clock(&mut self, count: u8) {
        for _ in 0..count {
            self.set_line(ControlLine::Clock, true);
            self.set_line(ControlLine::Clock, false);
        }
    }
}
