//! Sensor inputs: edge watchers feeding a channel, and the handler draining it.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use log::{debug, info, warn};
use lapkey_gpio::{GpioEdgeInput, GpioError};
use lapkey_gpio::edge::{BounceFilter, Edge};
use crate::config::SensorConfig;
use crate::indicator::Indicator;
use crate::net::Dispatch;

/// Pause after a failed edge read before reading again.
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// How often the handler looks at the `running` flag while no event comes in.
const HANDLER_WAKEUP: Duration = Duration::from_millis(100);

/// A sensor fired. Holds the index of the sensor in the configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SensorEvent {
    pub sensor: usize,
}

/// Waits for the edges of one sensor input and sends an event for each falling edge
/// that gets through the bounce filter.
#[derive(Debug)]
pub struct EdgeWatcher {
    sensor: usize,
    input: Box<dyn GpioEdgeInput>,
    filter: BounceFilter,
}

impl EdgeWatcher {
    pub fn new(sensor: usize, input: Box<dyn GpioEdgeInput>, bounce: Duration) -> Self {
        EdgeWatcher {
            sensor,
            input,
            filter: BounceFilter::new(bounce),
        }
    }

    /// Runs until the receiving side is gone or the input disconnects.
    ///
    /// Blocks in the edge read, so it only notices a closed channel on the next edge.
    pub fn run(mut self, events: Sender<SensorEvent>) {
        debug!("Watching sensor {} on {:?}", self.sensor, self.input);

        loop {
            let event = match self.input.read_edge() {
                Ok(event) => event,
                Err(GpioError::Disconnected) => break,
                Err(e) => {
                    warn!("Reading sensor {} failed: {}", self.sensor, e);
                    thread::sleep(READ_ERROR_BACKOFF);
                    continue;
                }
            };

            if event.edge != Edge::Falling || !self.filter.accept(&event) {
                continue;
            }
            if events.send(SensorEvent { sensor: self.sensor }).is_err() {
                break;
            }
        }

        debug!("Sensor {} watcher stopped.", self.sensor);
    }

    /// Runs the watcher on a thread of its own. The thread is not meant to be joined.
    pub fn spawn(self, events: Sender<SensorEvent>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("sensor-{}", self.sensor))
            .spawn(move || self.run(events))
    }
}

/// Reacts to sensor events: one indicator pulse and one grid-cell activation per event.
pub struct SensorHandler<'a> {
    sensors: &'a [SensorConfig],
    indicator: &'a Indicator<'a>,
    dispatch: &'a dyn Dispatch,
}

impl <'a> SensorHandler<'a> {
    pub fn new(sensors: &'a [SensorConfig], indicator: &'a Indicator<'a>, dispatch: &'a dyn Dispatch) -> Self {
        SensorHandler {
            sensors,
            indicator,
            dispatch,
        }
    }

    pub fn handle(&self, event: SensorEvent) {
        let Some(sensor) = self.sensors.get(event.sensor) else {
            warn!("Event from unknown sensor {}", event.sensor);
            return;
        };

        info!("Sensor {} triggered.", sensor.name);
        self.indicator.pulse();
        self.dispatch.activate_grid_cell(sensor.port, &sensor.activation());
    }

    /// Handles events until `running` is cleared or every sender is dropped.
    pub fn run(&self, events: Receiver<SensorEvent>, running: &AtomicBool) {
        while running.load(Ordering::SeqCst) {
            match events.recv_timeout(HANDLER_WAKEUP) {
                Ok(event) => self.handle(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("Sensor handler stopped.");
    }
}
