//! In-memory GPIO lines, for running the rest of the stack without hardware.
//!
//! A [VirtualLine] is both an input and an output: writes change the level seen by reads, and
//! clones share the same level, so a test can keep one clone and hand another to the code
//! under test. A [VirtualInput] computes its level from a closure, which is how wiring such as
//! a key matrix can be simulated. A [VirtualEdgeSource] pushes edge events to its
//! [VirtualEdgeInput] the way the kernel queues them for a line with edge detection.
use crate::edge::{Edge, EdgeEvent, EdgeTrigger};
use crate::{GpioEdgeInput, GpioError, GpioInput, GpioOutput, GpioResult};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Default)]
struct LineState {
    level: AtomicBool,
    activations: AtomicUsize,
    history: Mutex<Vec<bool>>,
}

/// A shared in-memory logical level.
#[derive(Clone, Default)]
pub struct VirtualLine {
    name: Arc<str>,
    state: Arc<LineState>,
}

impl VirtualLine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    /// Gets the current logical level.
    pub fn level(&self) -> bool {
        self.state.level.load(Ordering::SeqCst)
    }

    /// Sets the level from the outside, like an external device driving the line would.
    ///
    /// Not recorded in the write history.
    pub fn set(&self, level: bool) {
        self.state.level.store(level, Ordering::SeqCst);
    }

    /// Gets how many times the line was written from inactive to active.
    pub fn activations(&self) -> usize {
        self.state.activations.load(Ordering::SeqCst)
    }

    /// Gets every value written through [GpioOutput::write], oldest first.
    pub fn history(&self) -> Vec<bool> {
        self.state
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Debug for VirtualLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "VirtualLine({}={})", self.name, self.level())
    }
}

impl GpioInput for VirtualLine {
    fn read(&self) -> GpioResult<bool> {
        Ok(self.level())
    }
}

impl GpioOutput for VirtualLine {
    fn write(&self, value: bool) -> GpioResult<()> {
        let mut history = self
            .state
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = self.state.level.swap(value, Ordering::SeqCst);
        if value && !previous {
            self.state.activations.fetch_add(1, Ordering::SeqCst);
        }
        history.push(value);
        Ok(())
    }
}

type ReadFn = dyn Fn() -> GpioResult<bool> + Send + Sync;

/// An input whose level is computed on every read.
pub struct VirtualInput {
    name: Arc<str>,
    read: Box<ReadFn>,
}

impl VirtualInput {
    pub fn from_fn<F>(name: &str, read: F) -> Self
    where
        F: Fn() -> GpioResult<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            read: Box::new(read),
        }
    }
}

impl Debug for VirtualInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "VirtualInput({})", self.name)
    }
}

impl GpioInput for VirtualInput {
    fn read(&self) -> GpioResult<bool> {
        (self.read)()
    }
}

/// The driving end of a virtual edge-detecting line.
#[derive(Clone)]
pub struct VirtualEdgeSource {
    name: Arc<str>,
    events: Sender<EdgeEvent>,
    epoch: Instant,
}

impl VirtualEdgeSource {
    /// Creates a source and the input it feeds. The input only reports `trigger` edges.
    pub fn new(name: &str, trigger: EdgeTrigger) -> (VirtualEdgeSource, VirtualEdgeInput) {
        let (events, received) = mpsc::channel();
        let source = VirtualEdgeSource {
            name: name.into(),
            events,
            epoch: Instant::now(),
        };
        let input = VirtualEdgeInput {
            name: name.into(),
            trigger,
            events: received,
        };
        (source, input)
    }

    /// Queues an edge stamped with `time`. Dropped silently once the input is gone.
    pub fn push(&self, edge: Edge, time: Duration) {
        self.events.send(EdgeEvent { edge, time }).ok();
    }

    /// Queues a low pulse starting now: a falling edge and the rising edge `width` later.
    pub fn pulse_low(&self, width: Duration) {
        let now = self.epoch.elapsed();
        self.push(Edge::Falling, now);
        self.push(Edge::Rising, now + width);
    }
}

impl Debug for VirtualEdgeSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "VirtualEdgeSource({})", self.name)
    }
}

/// Receives the edges of a [VirtualEdgeSource]. Disconnects when every source clone is dropped.
pub struct VirtualEdgeInput {
    name: Arc<str>,
    trigger: EdgeTrigger,
    events: Receiver<EdgeEvent>,
}

impl Debug for VirtualEdgeInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "VirtualEdgeInput({}, {:?})", self.name, self.trigger)
    }
}

impl GpioEdgeInput for VirtualEdgeInput {
    fn read_edge(&mut self) -> GpioResult<EdgeEvent> {
        loop {
            let event = self.events.recv().map_err(|_| GpioError::Disconnected)?;
            if self.trigger.matches(event.edge) {
                return Ok(event);
            }
        }
    }
}
