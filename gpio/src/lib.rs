pub mod edge;
pub mod gpiod;
pub mod keypad;
pub mod virt;

use std::fmt::Debug;
use thiserror::Error;
use crate::edge::{EdgeEvent, EdgeTrigger};

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("edge source disconnected")]
    Disconnected,
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO lines available.
    fn count(&self) -> GpioResult<usize>;

    /// Gets the GPIO pin at the given line offset.
    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>>;
}

/// Specifies the active level of the GPIO pin.
///
/// By default, the active level is high.
///
/// Might be software-implemented.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default] High,
    Low,
}

/// Specifies the bias of the GPIO pin.
///
/// You can use this to enable pull-up or pull-down resistors.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default] None,
    PullUp,
    PullDown,
}

/// A GPIO pin that has been claimed from a [GpioDriver], but not yet configured as an input or output.
///
/// Configuration (active level, bias) has to be done before calling [GpioPin::as_input] or
/// [GpioPin::as_output].
pub trait GpioPin: Debug + Send + Sync {
    /// Gets the line offset of the pin.
    fn index(&self) -> usize;

    /// Sets the GPIO pin function to input, allowing reading its state.
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>>;
    /// Sets the GPIO pin function to output, allowing writing its state.
    ///
    /// The output starts in the inactive state.
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>>;
    /// Turns the pin into an input reporting `trigger` edges as they happen.
    ///
    /// The returned input owns the line, so it can outlive the driver borrow and be moved to
    /// a thread of its own.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` if the backend has no edge events.
    fn into_edge_input(self: Box<Self>, _trigger: EdgeTrigger) -> GpioResult<Box<dyn GpioEdgeInput>> {
        Err(GpioError::NotSupported)
    }

    /// Sets the active level of the GPIO pin.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` if the pin does not support active level.
    fn set_active_level(&mut self, _level: GpioActiveLevel) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }

    /// Sets the bias of the GPIO pin.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` if the pin does not support bias.
    fn set_bias(&mut self, _bias: GpioBias) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }
}

/// Input side of a GPIO pin.
///
/// Values are logical: `true` means the pin is at its active level.
pub trait GpioInput: Debug + Send + Sync {
    /// Reads the state of the GPIO pin.
    fn read(&self) -> GpioResult<bool>;
}

/// Output side of a GPIO pin.
///
/// Values are logical: `true` drives the pin to its active level.
pub trait GpioOutput: Debug + Send + Sync {
    /// Writes the state of the GPIO pin.
    fn write(&self, value: bool) -> GpioResult<()>;
}

/// Input side of a GPIO pin with edge detection.
pub trait GpioEdgeInput: Debug + Send {
    /// Blocks until the next edge.
    ///
    /// # Errors
    /// - `GpioError::Disconnected` once no more edges can ever arrive.
    fn read_edge(&mut self) -> GpioResult<EdgeEvent>;
}
