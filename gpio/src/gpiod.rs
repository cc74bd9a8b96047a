//! GPIO driver backed by the Linux GPIO character device, using the gpiod library.
//!
//! Line offsets are the kernel's (BCM numbering on a Raspberry Pi), not physical header pins.
//! Every line request is owned by the returned input/output handle, and dropping the handle
//! hands the line back to the kernel. Edge inputs ask the kernel for edge events, which are
//! queued with their timestamps even while nobody is reading.
use crate::edge::{Edge, EdgeEvent, EdgeTrigger};
use crate::{
    GpioActiveLevel, GpioBias, GpioDriver, GpioEdgeInput, GpioError, GpioInput, GpioOutput,
    GpioPin, GpioResult,
};
use bitvec::vec::BitVec;
use log::trace;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::AtomicU8;

type UsedLines = Arc<BitVec<AtomicU8>>;

/// GpiodDriver is a GPIO driver that uses the gpiod library to manage GPIO lines.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    used_lines: UsedLines,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let n = chip.num_lines() as usize;
        Self {
            chip,
            used_lines: Arc::new(BitVec::repeat(false, n)),
        }
    }

    /// Opens the GPIO chip at the given path (for example `/dev/gpiochip0`). Relative paths are
    /// looked up under `/dev`.
    pub fn open(path: &str) -> GpioResult<Self> {
        let chip = gpiod::Chip::new(path)?;
        Ok(Self::new(chip))
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_lines[index] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_lines.set_aliased(index, true);

        Ok(Box::new(GpiodPin {
            driver: self,
            claim: LineClaim {
                used: self.used_lines.clone(),
                index,
            },
            active_level: GpioActiveLevel::High,
            bias: GpioBias::None,
        }))
    }
}

impl From<GpioActiveLevel> for gpiod::Active {
    fn from(level: GpioActiveLevel) -> Self {
        match level {
            GpioActiveLevel::High => gpiod::Active::High,
            GpioActiveLevel::Low => gpiod::Active::Low,
        }
    }
}

impl From<GpioBias> for gpiod::Bias {
    fn from(bias: GpioBias) -> Self {
        match bias {
            GpioBias::None => gpiod::Bias::Disable,
            GpioBias::PullUp => gpiod::Bias::PullUp,
            GpioBias::PullDown => gpiod::Bias::PullDown,
        }
    }
}

impl From<EdgeTrigger> for gpiod::EdgeDetect {
    fn from(trigger: EdgeTrigger) -> Self {
        match trigger {
            EdgeTrigger::Rising => gpiod::EdgeDetect::Rising,
            EdgeTrigger::Falling => gpiod::EdgeDetect::Falling,
            EdgeTrigger::Both => gpiod::EdgeDetect::Both,
        }
    }
}

/// Marks a line offset as taken until dropped.
struct LineClaim {
    used: UsedLines,
    index: usize,
}

impl Drop for LineClaim {
    fn drop(&mut self) {
        trace!("Line {} released", self.index);
        self.used.set_aliased(self.index, false);
    }
}

struct GpiodPin<'a> {
    driver: &'a GpiodDriver,
    claim: LineClaim,
    active_level: GpioActiveLevel,
    bias: GpioBias,
}

impl GpiodPin<'_> {
    fn line(&self) -> u32 {
        self.claim.index as u32
    }
}

impl Debug for GpiodPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.claim.index)
    }
}

impl GpioPin for GpiodPin<'_> {
    fn index(&self) -> usize {
        self.claim.index
    }

    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>> {
        let line = self.driver.chip.request_lines(
            gpiod::Options::input([self.line()])
                .consumer(env!("CARGO_PKG_NAME"))
                .active(self.active_level.into())
                .bias(self.bias.into()),
        )?;
        trace!("{:?} requested as input", self);
        let input = GpiodInput { pin: self, line };
        Ok(Box::new(input))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        let line = self.driver.chip.request_lines(
            gpiod::Options::output([self.line()])
                .consumer(env!("CARGO_PKG_NAME"))
                .active(self.active_level.into())
                .bias(self.bias.into()),
        )?;
        trace!("{:?} requested as output", self);
        let output = GpiodOutput { pin: self, line };
        output.write(false)?;
        Ok(Box::new(output))
    }

    fn into_edge_input(self: Box<Self>, trigger: EdgeTrigger) -> GpioResult<Box<dyn GpioEdgeInput>> {
        let lines = self.driver.chip.request_lines(
            gpiod::Options::input([self.line()])
                .consumer(env!("CARGO_PKG_NAME"))
                .active(self.active_level.into())
                .bias(self.bias.into())
                .edge(trigger.into()),
        )?;
        trace!("{:?} requested for {:?} edges", self, trigger);

        let name = format!("{:?}", self);
        let GpiodPin { claim, .. } = *self;
        Ok(Box::new(GpiodEdgeInput { name, claim, lines }))
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        self.active_level = level;
        Ok(())
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        self.bias = bias;
        Ok(())
    }
}

struct GpiodInput<'a> {
    pin: &'a GpiodPin<'a>,
    line: gpiod::Lines<gpiod::Input>,
}

impl Debug for GpiodInput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.pin)
    }
}

impl GpioInput for GpiodInput<'_> {
    fn read(&self) -> GpioResult<bool> {
        let [value] = self.line.get_values([false])?;
        Ok(value)
    }
}

struct GpiodOutput<'a> {
    pin: &'a GpiodPin<'a>,
    line: gpiod::Lines<gpiod::Output>,
}

impl Debug for GpiodOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.pin)
    }
}

impl GpioOutput for GpiodOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.line.set_values([value])?;
        Ok(())
    }
}

/// A line requested with edge detection. Owns its claim, so it does not borrow the driver.
struct GpiodEdgeInput {
    name: String,
    // Released after the line request is closed.
    lines: gpiod::Lines<gpiod::Input>,
    claim: LineClaim,
}

impl Debug for GpiodEdgeInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[edges]", self.name)
    }
}

impl GpioEdgeInput for GpiodEdgeInput {
    fn read_edge(&mut self) -> GpioResult<EdgeEvent> {
        let event = self.lines.read_event()?;
        let edge = match event.edge {
            gpiod::Edge::Rising => Edge::Rising,
            gpiod::Edge::Falling => Edge::Falling,
        };
        trace!("{:?}: {:?} edge on line {} at {:?}", self, edge, self.claim.index, event.time);
        Ok(EdgeEvent {
            edge,
            time: event.time,
        })
    }
}
