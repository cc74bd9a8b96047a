//! Turns a recorded key sequence into an action.

use log::{info, warn};
use crate::indicator::Indicator;
use crate::net::{Dispatch, PresentationAction};
use crate::power::PowerControl;

/// Sequence that powers the device off.
pub const SHUTDOWN_SEQUENCE: &str = "9999";
/// Sequence that reboots the device.
pub const REBOOT_SEQUENCE: &str = "9998";
/// Sequence that clears the presentation.
pub const CLEAR_SEQUENCE: &str = "00";

/// Number of indicator pulses announcing a shutdown or reboot.
const POWER_PULSES: usize = 5;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Command {
    Shutdown,
    Reboot,
    Clear,
    LapCount(String),
    /// Nothing was typed between `*` and `#`.
    Empty,
}

impl Command {
    /// Maps a sequence to its command. Only exact matches count for the special sequences.
    pub fn parse(sequence: &str) -> Command {
        match sequence {
            SHUTDOWN_SEQUENCE => Command::Shutdown,
            REBOOT_SEQUENCE => Command::Reboot,
            CLEAR_SEQUENCE => Command::Clear,
            "" => Command::Empty,
            count => Command::LapCount(count.to_string()),
        }
    }
}

/// Whether the main loop keeps going after a command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Flow {
    Continue,
    /// The device is going down, stop handling input.
    Halt,
}

pub struct Interpreter<'a> {
    dispatch: &'a dyn Dispatch,
    power: &'a dyn PowerControl,
    indicator: &'a Indicator<'a>,
}

impl <'a> Interpreter<'a> {
    pub fn new(dispatch: &'a dyn Dispatch, power: &'a dyn PowerControl, indicator: &'a Indicator<'a>) -> Self {
        Interpreter {
            dispatch,
            power,
            indicator,
        }
    }

    pub fn execute(&self, command: &Command) -> Flow {
        match command {
            Command::Shutdown => {
                self.indicator.pulse_times(POWER_PULSES);
                info!("Shutdown sequence entered, shutting down...");
                self.power.shutdown();
                Flow::Halt
            }
            Command::Reboot => {
                self.indicator.pulse_times(POWER_PULSES);
                info!("Reboot sequence entered, rebooting...");
                self.power.reboot();
                Flow::Halt
            }
            Command::Clear => {
                info!("Clearing presentation.");
                self.dispatch.notify_presentation(PresentationAction::Clear);
                Flow::Continue
            }
            Command::LapCount(count) => {
                info!("Sending lap count {}.", count);
                self.dispatch.deliver_lap_count(count);
                self.dispatch.notify_presentation(PresentationAction::Trigger);
                Flow::Continue
            }
            Command::Empty => {
                warn!("Empty sequence entered, nothing to send.");
                Flow::Continue
            }
        }
    }
}
