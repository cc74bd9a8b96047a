mod gpio;

use std::fmt::Debug;
use crate::GpioResult;
pub use gpio::*;

/// The `Keypad` trait defines the interface for keypad input devices.
pub trait Keypad: Debug {
    type Key;

    /// Scans the keypad once and returns the pressed key, if any.
    ///
    /// Implementations report a held key only once, so a caller polling in a loop gets one
    /// event per physical press.
    fn read(&self) -> GpioResult<Option<Self::Key>>;
}
