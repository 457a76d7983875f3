mod signals_interface;
mod signals_virtual;

pub use signals_interface::*;
pub use signals_virtual::{SignalEvent, VirtualBus};
