//! The module for the main loop state and logic.

use log::{debug, info};
use lapkey_gpio::GpioResult;
use lapkey_gpio::keypad::{Keypad, KeypadKey};
use crate::command::{Command, Flow, Interpreter};
use crate::indicator::Indicator;
use crate::recorder::SequenceRecorder;

/// The keypad side of the device: scanning, recording and command execution.
pub struct App<'a> {
    /// The keypad the keys are read from.
    keypad: &'a dyn Keypad<Key = KeypadKey>,
    /// The light acknowledging each key press.
    indicator: &'a Indicator<'a>,
    recorder: SequenceRecorder,
    interpreter: Interpreter<'a>,
}

impl <'a> App<'a> {
    pub fn new(
        keypad: &'a dyn Keypad<Key = KeypadKey>,
        indicator: &'a Indicator<'a>,
        interpreter: Interpreter<'a>,
    ) -> App<'a> {
        App {
            keypad,
            indicator,
            recorder: SequenceRecorder::new(),
            interpreter,
        }
    }

    /// Scans the keypad once and handles the key, if one was pressed.
    pub fn update(&mut self) -> GpioResult<Flow> {
        let Some(key) = self.keypad.read()? else {
            return Ok(Flow::Continue);
        };

        debug!("Key {} pressed.", key.to_char());
        Ok(self.handle_key(key))
    }

    /// Handles one key press. Every key blinks the indicator, whatever it does otherwise.
    pub fn handle_key(&mut self, key: KeypadKey) -> Flow {
        self.indicator.pulse();

        match self.recorder.feed(key) {
            Some(sequence) => {
                info!("Recorded keys: {}", sequence);
                self.interpreter.execute(&Command::parse(&sequence))
            }
            None => Flow::Continue,
        }
    }
}
