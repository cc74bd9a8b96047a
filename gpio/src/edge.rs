//! Edge events reported by the backend, and the bounce filter applied on top of them.
//!
//! Edges come from the kernel (or a virtual source) with the time they happened, so short
//! pulses are never lost to sampling and bounce filtering works on the real edge times.
use std::time::Duration;
use log::trace;

/// A level transition of a GPIO input.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Edge {
    /// Inactive to active.
    Rising,
    /// Active to inactive.
    Falling,
}

/// Selects which transitions are reported.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum EdgeTrigger {
    Rising,
    #[default] Falling,
    Both,
}

impl EdgeTrigger {
    pub fn matches(&self, edge: Edge) -> bool {
        match self {
            EdgeTrigger::Rising => edge == Edge::Rising,
            EdgeTrigger::Falling => edge == Edge::Falling,
            EdgeTrigger::Both => true,
        }
    }
}

/// An edge and the monotonic time it was detected at.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EdgeEvent {
    pub edge: Edge,
    pub time: Duration,
}

/// Drops edges that follow the last accepted one by less than `bounce_time`.
#[derive(Copy, Clone, Debug)]
pub struct BounceFilter {
    pub bounce_time: Duration,
    last: Option<Duration>,
}

impl BounceFilter {
    pub fn new(bounce_time: Duration) -> Self {
        BounceFilter {
            bounce_time,
            last: None,
        }
    }

    /// Returns whether `event` gets through, and if so, restarts the window from it.
    pub fn accept(&mut self, event: &EdgeEvent) -> bool {
        if let Some(last) = self.last {
            if event.time.saturating_sub(last) < self.bounce_time {
                trace!("{:?} edge dropped inside bounce window", event.edge);
                return false;
            }
        }

        self.last = Some(event.time);
        true
    }
}

impl Default for BounceFilter {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}
