mod peripherals_host;
mod peripherals_interface;

pub use peripherals_host::{Absent, HostClock, LoggedSpeaker, SerialConsole, SERIAL_TX_BUFFER};
pub use peripherals_interface::*;

// Mock implementation for testing.
#[cfg(test)]
mod peripherals_mock;
#[cfg(test)]
pub use peripherals_mock::{BoardState, MockBoard};

/// The devices the controller talks to on behalf of the host.
pub struct Peripherals {
    pub serial: Box<dyn SerialPort>,
    pub rtc: Box<dyn RtcClock>,
    pub gpio: Box<dyn GpioExpander>,
    pub speaker: Box<dyn Speaker>,
    pub parallel: Box<dyn ParallelPort>,
    pub expansion: Box<dyn ExpansionBus>,
}

impl Peripherals {
    /// A board with nothing fitted and a speaker that only logs.
    pub fn absent() -> Self {
        Peripherals {
            serial: Box::new(Absent),
            rtc: Box::new(Absent),
            gpio: Box::new(Absent),
            speaker: Box::new(LoggedSpeaker),
            parallel: Box::new(Absent),
            expansion: Box::new(Absent),
        }
    }

    pub fn with_serial(mut self, serial: Box<dyn SerialPort>) -> Self {
        self.serial = serial;
        self
    }

    pub fn with_rtc(mut self, rtc: Box<dyn RtcClock>) -> Self {
        self.rtc = rtc;
        self
    }
}
