//! Records the digits typed between `*` and `#`.

use log::{debug, trace};
use lapkey_gpio::keypad::KeypadKey;

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording(String),
}

#[derive(Debug, Default)]
pub struct SequenceRecorder {
    state: RecorderState,
}

impl SequenceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RecorderState {
        &self.state
    }

    /// Feeds one key press. Returns the finished sequence when `#` closes a recording.
    ///
    /// `*` starts a recording, dropping anything recorded so far. Digits are appended while
    /// recording and ignored otherwise, and so is a `#` with no recording in progress.
    pub fn feed(&mut self, key: KeypadKey) -> Option<String> {
        match key {
            KeypadKey::KeyAsterisk => {
                debug!("Recording started.");
                self.state = RecorderState::Recording(String::new());
                None
            }
            KeypadKey::KeyHash => match std::mem::take(&mut self.state) {
                RecorderState::Recording(sequence) => Some(sequence),
                RecorderState::Idle => {
                    trace!("# without recording, ignored.");
                    None
                }
            },
            key => {
                if let (RecorderState::Recording(buffer), Some(digit)) = (&mut self.state, key.digit()) {
                    buffer.push(digit);
                }
                None
            }
        }
    }
}
