use log::{debug, info};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::mpsc::{Receiver, TryRecvError};
use time::OffsetDateTime;

use super::peripherals_interface::*;

/// A real-time clock reading the host's wall clock. There is no sensor, so
/// the temperature is always 0.
pub struct HostClock {
    reading: DateTime,
}

impl HostClock {
    pub fn new() -> Self {
        HostClock { reading: DateTime::default() }
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl RtcClock for HostClock {
    fn is_present(&self) -> bool {
        true
    }

    fn refresh(&mut self) {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        self.reading = DateTime {
            seconds: now.second(),
            minutes: now.minute(),
            hours: now.hour(),
            day: now.day(),
            month: u8::from(now.month()),
            year: now.year().rem_euclid(100) as u8,
            temperature: 0,
        };
    }

    fn date_time(&self) -> DateTime {
        self.reading
    }
}

/// Size of the transmit buffer reported to the host.
pub const SERIAL_TX_BUFFER: u8 = 63;

/// A serial console fed by a channel of received bytes and writing its
/// output to any `Write`.
pub struct SerialConsole<W> {
    input_rx: Receiver<u8>,
    received: VecDeque<u8>,
    output: W,
}

impl<W: Write> SerialConsole<W> {
    pub fn new(input_rx: Receiver<u8>, output: W) -> Self {
        SerialConsole {
            input_rx,
            received: VecDeque::new(),
            output,
        }
    }

    /// Move everything waiting on the channel into the receive buffer.
    fn drain_channel(&mut self) {
        loop {
            match self.input_rx.try_recv() {
                Ok(byte) => self.received.push_back(byte),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }
}

impl<W: Write> SerialPort for SerialConsole<W> {
    fn available(&mut self) -> bool {
        self.drain_channel();
        !self.received.is_empty()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.drain_channel();
        self.received.pop_front()
    }

    fn write_byte(&mut self, value: u8) {
        if let Err(e) = self.output.write_all(&[value]).and_then(|_| self.output.flush()) {
            debug!("Serial output dropped: {}", e);
        }
    }

    fn tx_free(&self) -> u8 {
        SERIAL_TX_BUFFER
    }
}

/// Stand-in for a peripheral that is not fitted.
pub struct Absent;

impl RtcClock for Absent {
    fn is_present(&self) -> bool {
        false
    }

    fn refresh(&mut self) {}

    fn date_time(&self) -> DateTime {
        DateTime::default()
    }
}

impl SerialPort for Absent {
    fn available(&mut self) -> bool {
        false
    }

    fn read_byte(&mut self) -> Option<u8> {
        None
    }

    fn write_byte(&mut self, _value: u8) {}

    fn tx_free(&self) -> u8 {
        0
    }
}

impl GpioExpander for Absent {
    fn is_present(&self) -> bool {
        false
    }

    fn write_register(&mut self, _register: GpioRegister, _value: u8) {}

    fn read_register(&mut self, _register: GpioRegister) -> u8 {
        0
    }
}

impl ParallelPort for Absent {
    fn is_present(&self) -> bool {
        false
    }

    fn init(&mut self, _auto_feed: bool) {}

    fn write(&mut self, _value: u8) {}

    fn status(&mut self) -> u8 {
        0
    }
}

impl ExpansionBus for Absent {
    fn present_cards(&self) -> u8 {
        0
    }
}

/// A speaker that only reports what it would play.
pub struct LoggedSpeaker;

impl Speaker for LoggedSpeaker {
    fn set_tone(&mut self, value: u8) {
        if value == 0 {
            info!("Speaker off.");
        } else {
            info!("Speaker tone {}.", value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::mpsc;

    #[test]
    fn test_serial_console() {
        let (tx, rx) = mpsc::channel();
        let mut console = SerialConsole::new(rx, Vec::new());
        assert!(!console.available());
        assert_eq!(console.read_byte(), None);

        tx.send(b'h').unwrap();
        tx.send(b'i').unwrap();
        assert!(console.available());
        assert_eq!(console.read_byte(), Some(b'h'));
        drop(tx);
        assert_eq!(console.read_byte(), Some(b'i'));
        assert_eq!(console.read_byte(), None);

        console.write_byte(b'o');
        console.write_byte(b'k');
        assert_eq!(console.output, b"ok");
        assert_eq!(console.tx_free(), SERIAL_TX_BUFFER);
    }

    #[test]
    fn test_host_clock_fields_in_range() {
        let mut clock = HostClock::new();
        assert!(clock.is_present());
        clock.refresh();
        let now = clock.date_time();
        assert!(now.seconds < 61);
        assert!(now.minutes < 60);
        assert!(now.hours < 24);
        assert!((1..=31).contains(&now.day));
        assert!((1..=12).contains(&now.month));
        assert!(now.year < 100);
        assert_eq!(now.temperature, 0);
    }
}
