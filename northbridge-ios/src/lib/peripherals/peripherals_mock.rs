use std::cell::{RefCell, RefMut};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use super::Peripherals;
use super::peripherals_interface::*;

/// Everything the mock board's devices see and record.
#[derive(Default)]
pub struct BoardState {
    pub serial_in: VecDeque<u8>,
    pub serial_out: Vec<u8>,
    pub tx_free: u8,
    pub rtc_present: bool,
    pub rtc_refreshes: usize,
    pub date_time: DateTime,
    pub gpio_present: bool,
    pub gpio: HashMap<GpioRegister, u8>,
    pub tones: Vec<u8>,
    pub parallel_present: bool,
    pub parallel_auto_feed: Option<bool>,
    pub parallel_out: Vec<u8>,
    pub parallel_status: u8,
    pub cards: u8,
}

/// A board of mock peripherals sharing one recorded state, so tests can
/// inspect side effects after handing the devices to the dispatcher.
#[derive(Clone, Default)]
pub struct MockBoard {
    state: Rc<RefCell<BoardState>>,
}

impl MockBoard {
    /// A board with every peripheral fitted.
    pub fn new() -> Self {
        let board = MockBoard::default();
        {
            let mut state = board.state();
            state.tx_free = 63;
            state.rtc_present = true;
            state.gpio_present = true;
            state.parallel_present = true;
        }
        board
    }

    pub fn state(&self) -> RefMut<'_, BoardState> {
        self.state.borrow_mut()
    }

    pub fn peripherals(&self) -> Peripherals {
        Peripherals {
            serial: Box::new(self.clone()),
            rtc: Box::new(self.clone()),
            gpio: Box::new(self.clone()),
            speaker: Box::new(self.clone()),
            parallel: Box::new(self.clone()),
            expansion: Box::new(self.clone()),
        }
    }
}

impl RtcClock for MockBoard {
    fn is_present(&self) -> bool {
        self.state.borrow().rtc_present
    }

    fn refresh(&mut self) {
        self.state().rtc_refreshes += 1;
    }

    fn date_time(&self) -> DateTime {
        self.state.borrow().date_time
    }
}

impl SerialPort for MockBoard {
    fn available(&mut self) -> bool {
        !self.state().serial_in.is_empty()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.state().serial_in.pop_front()
    }

    fn write_byte(&mut self, value: u8) {
        self.state().serial_out.push(value);
    }

    fn tx_free(&self) -> u8 {
        self.state.borrow().tx_free
    }
}

impl GpioExpander for MockBoard {
    fn is_present(&self) -> bool {
        self.state.borrow().gpio_present
    }

    fn write_register(&mut self, register: GpioRegister, value: u8) {
        self.state().gpio.insert(register, value);
    }

    fn read_register(&mut self, register: GpioRegister) -> u8 {
        self.state().gpio.get(&register).copied().unwrap_or(0)
    }
}

impl Speaker for MockBoard {
    fn set_tone(&mut self, value: u8) {
        self.state().tones.push(value);
    }
}

impl ParallelPort for MockBoard {
    fn is_present(&self) -> bool {
        self.state.borrow().parallel_present
    }

    fn init(&mut self, auto_feed: bool) {
        self.state().parallel_auto_feed = Some(auto_feed);
    }

    fn write(&mut self, value: u8) {
        self.state().parallel_out.push(value);
    }

    fn status(&mut self) -> u8 {
        self.state().parallel_status
    }
}

impl ExpansionBus for MockBoard {
    fn present_cards(&self) -> u8 {
        self.state.borrow().cards
    }
}
