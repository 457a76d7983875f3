/// One snapshot of the real-time clock. `year` is the two-digit year.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub day: u8,
    pub month: u8,
    pub year: u8,
    pub temperature: i8,
}

impl DateTime {
    /// The fields in the order the host reads them.
    pub fn fields(&self) -> [u8; 7] {
        [self.seconds, self.minutes, self.hours, self.day, self.month, self.year,
         self.temperature as u8]
    }
}

pub trait RtcClock {
    fn is_present(&self) -> bool;
    /// Take a fresh reading from the clock chip.
    fn refresh(&mut self);
    /// The most recent reading.
    fn date_time(&self) -> DateTime;
}

pub trait SerialPort {
    /// Is at least one received byte waiting?
    fn available(&mut self) -> bool;
    fn read_byte(&mut self) -> Option<u8>;
    fn write_byte(&mut self, value: u8);
    /// Free space in the transmit buffer.
    fn tx_free(&self) -> u8;
}

/// Registers of the GPIO expander reachable from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpioRegister {
    IoDirA = 0x00,
    IoDirB = 0x01,
    GpPuA = 0x0C,
    GpPuB = 0x0D,
    GpioA = 0x12,
    GpioB = 0x13,
}

/// An I2C GPIO expander. Callers must check `is_present` first.
pub trait GpioExpander {
    fn is_present(&self) -> bool;
    fn write_register(&mut self, register: GpioRegister, value: u8);
    fn read_register(&mut self, register: GpioRegister) -> u8;
}

pub trait Speaker {
    /// Zero silences the speaker; anything else starts a tone.
    fn set_tone(&mut self, value: u8);
}

/// A parallel printer port. Callers must check `is_present` first.
pub trait ParallelPort {
    fn is_present(&self) -> bool;
    fn init(&mut self, auto_feed: bool);
    fn write(&mut self, value: u8);
    /// The printer status lines.
    fn status(&mut self) -> u8;
}

pub const EXPANSION_SLOTS: u8 = 3;

pub trait ExpansionBus {
    /// Bit n is set when slot n + 1 holds a card.
    fn present_cards(&self) -> u8;
}
