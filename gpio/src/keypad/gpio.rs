use std::fmt::{Debug, Formatter};
use std::thread;
use std::time::Duration;
use log::trace;
use crate::{GpioInput, GpioOutput, GpioResult};
use crate::keypad::Keypad;

/// Represents the keys on a 4x3 keypad.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum KeypadKey {
    /// The `1` key.
    Key1,
    /// The `2` key.
    Key2,
    /// The `3` key.
    Key3,
    /// The `4` key.
    Key4,
    /// The `5` key.
    Key5,
    /// The `6` key.
    Key6,
    /// The `7` key.
    Key7,
    /// The `8` key.
    Key8,
    /// The `9` key.
    Key9,
    /// The `0` key.
    Key0,
    /// The `*` key.
    KeyAsterisk,
    /// The `#` key.
    KeyHash,
}

impl KeypadKey {
    /// Number of rows on the keypad.
    pub const ROWS: usize = 4;
    /// Number of columns on the keypad.
    pub const COLS: usize = 3;

    /// Converts a position tuple (row, column) to a [KeypadKey].
    pub fn from_position(pos: (usize, usize)) -> Option<KeypadKey> {
        use KeypadKey::*;

        const KEYS: [[KeypadKey; KeypadKey::COLS]; KeypadKey::ROWS] = [
            [ Key1, Key2, Key3, ],
            [ Key4, Key5, Key6, ],
            [ Key7, Key8, Key9, ],
            [ KeyAsterisk, Key0, KeyHash, ],
        ];

        KEYS.get(pos.0).and_then(|row| row.get(pos.1)).copied()
    }

    /// Converts the [KeypadKey] to its corresponding character.
    pub fn to_char(self) -> char {
        use KeypadKey::*;

        match self {
            Key1 => '1',
            Key2 => '2',
            Key3 => '3',
            Key4 => '4',
            Key5 => '5',
            Key6 => '6',
            Key7 => '7',
            Key8 => '8',
            Key9 => '9',
            Key0 => '0',
            KeyAsterisk => '*',
            KeyHash => '#',
        }
    }

    /// Converts a character back to a [KeypadKey].
    pub fn from_char(c: char) -> Option<KeypadKey> {
        (0..Self::ROWS)
            .flat_map(|row| (0..Self::COLS).map(move |col| (row, col)))
            .filter_map(Self::from_position)
            .find(|key| key.to_char() == c)
    }

    /// Gets the digit character of the key, or `None` for `*` and `#`.
    pub fn digit(self) -> Option<char> {
        Some(self.to_char()).filter(char::is_ascii_digit)
    }
}

/// The `GpioKeypad` struct represents a GPIO-based matrix keypad with 3 columns and 4 rows.
///
/// Columns are outputs and rows are inputs, both in logical levels: a column written `true`
/// is driven (low on the usual active-low wiring) and a row reading `true` sees the driven
/// column through a pressed key.
pub struct GpioKeypad<'a> {
    cols: [&'a dyn GpioOutput; KeypadKey::COLS],
    rows: [&'a dyn GpioInput; KeypadKey::ROWS],
    pub release_poll: Duration,
}

impl Debug for GpioKeypad<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpioKeypad({:?}, {:?})", self.cols, self.rows)
    }
}

impl <'a> GpioKeypad<'a> {
    /// Creates a new `GpioKeypad` instance with the specified GPIO outputs for columns and inputs for rows.
    ///
    /// The columns are used to write the active state, and the rows are used to read the pressed keys
    /// in the active column.
    pub fn new(
        cols: [&'a dyn GpioOutput; KeypadKey::COLS],
        rows: [&'a dyn GpioInput; KeypadKey::ROWS],
    ) -> Self {
        GpioKeypad {
            cols,
            rows,
            release_poll: Duration::from_millis(50),
        }
    }

    pub fn with_release_poll(mut self, release_poll: Duration) -> Self {
        self.release_poll = release_poll;
        self
    }

    /// Puts every column back to idle.
    pub fn reset(&self) -> GpioResult<()> {
        for col in self.cols {
            col.write(false)?;
        }
        Ok(())
    }

    /// Reads the rows while `col` is driven. Waits for the key to be released before returning it.
    fn scan_column(&self, col: usize) -> GpioResult<Option<KeypadKey>> {
        for (row, input) in self.rows.iter().enumerate() {
            if !input.read()? {
                continue;
            }

            let key = KeypadKey::from_position((row, col));
            trace!("Key {:?} down at ({}, {})", key, row, col);

            while input.read()? {
                thread::sleep(self.release_poll);
            }

            if key.is_some() {
                return Ok(key);
            }
        }

        Ok(None)
    }
}

impl Keypad for GpioKeypad<'_> {
    type Key = KeypadKey;

    fn read(&self) -> GpioResult<Option<Self::Key>> {
        for (col, output) in self.cols.iter().enumerate() {
            output.write(true)?;
            let scanned = self.scan_column(col);
            // The column has to go back to idle even if the scan failed.
            output.write(false)?;

            if let Some(key) = scanned? {
                return Ok(Some(key));
            }
        }

        Ok(None)
    }
}
