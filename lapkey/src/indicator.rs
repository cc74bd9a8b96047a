//! The indicator light, shared by the main loop and the sensor handler.

use std::fmt::{Debug, Formatter};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use log::warn;
use lapkey_gpio::{GpioOutput, GpioResult};

pub struct Indicator<'a> {
    output: &'a dyn GpioOutput,
    lock: Mutex<()>,
    pub pulse: Duration,
    pub gap: Duration,
}

impl <'a> Indicator<'a> {
    pub fn new(output: &'a dyn GpioOutput, pulse: Duration, gap: Duration) -> Self {
        Indicator {
            output,
            lock: Mutex::new(()),
            pulse,
            gap,
        }
    }

    /// Lights the indicator for one pulse.
    ///
    /// Holds the output for the whole pulse, so pulses requested from different threads
    /// come out one after another. Failures are logged, never returned.
    pub fn pulse(&self) {
        if let Err(e) = self.try_pulse() {
            warn!("Indicator pulse failed: {}", e);
        }
    }

    fn try_pulse(&self) -> GpioResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.output.write(true)?;
        thread::sleep(self.pulse);
        self.output.write(false)
    }

    /// Pulses `count` times, pausing [Indicator::gap] after each pulse.
    pub fn pulse_times(&self, count: usize) {
        for _ in 0..count {
            self.pulse();
            thread::sleep(self.gap);
        }
    }

    /// Switches the indicator off.
    pub fn off(&self) -> GpioResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.output.write(false)
    }
}

impl Debug for Indicator<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Indicator({:?})", self.output)
    }
}
