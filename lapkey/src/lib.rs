//! Keypad and sensor dispatcher: reads a 4x3 matrix keypad and two sensor inputs and turns
//! them into lap-count telegrams, presentation notifications and grid-cell activations.

pub mod app;
pub mod command;
pub mod config;
pub mod indicator;
pub mod net;
pub mod power;
pub mod recorder;
pub mod sensor;
pub mod signal;
