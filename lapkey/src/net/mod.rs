//! Outbound network traffic: presentation notifications, grid-cell activations and lap-count
//! telegrams, plus the startup connectivity probe.

mod dispatcher;
pub mod probe;

use std::fmt::{Display, Formatter};
use serde::Serialize;
use thiserror::Error;
pub use dispatcher::*;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),
    #[error("no address found for {0}")]
    Resolve(String),
    #[error("gave up after {0} attempts")]
    Exhausted(u32),
}

/// What the presentation layer is told to do.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PresentationAction {
    /// Reset the display.
    Clear,
    /// Show that a lap count came in.
    Trigger,
}

impl Display for PresentationAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            PresentationAction::Clear => "clear",
            PresentationAction::Trigger => "trigger",
        };
        write!(f, "{}", str)
    }
}

/// JSON body of a grid-cell activation request.
#[derive(Serialize, Debug, Clone, Eq, PartialEq)]
pub struct GridCellActivation {
    pub action: &'static str,
    pub grid: String,
    pub cell: [u16; 2],
}

impl GridCellActivation {
    pub fn new(grid: &str, cell: [u16; 2]) -> Self {
        GridCellActivation {
            action: "activate_grid_cell",
            grid: grid.to_string(),
            cell,
        }
    }
}

/// Builds the telegram carrying a lap count.
pub fn lap_count_telegram(count: &str) -> String {
    format!("Lap_Count={}\n", count)
}

/// Everything the input handlers can ask of the network.
///
/// Every operation is best-effort: failures are logged by the implementation and never
/// reported back, so an unreachable server can not stop the input loops.
pub trait Dispatch: Send + Sync {
    /// Sends one presentation notification. Not retried.
    fn notify_presentation(&self, action: PresentationAction);

    /// Sends one grid-cell activation to the given port of the server. Not retried.
    fn activate_grid_cell(&self, port: u16, activation: &GridCellActivation);

    /// Delivers a lap-count telegram, retrying according to the retry policy.
    fn deliver_lap_count(&self, count: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telegram_format() {
        assert_eq!(lap_count_telegram("1234"), "Lap_Count=1234\n");
    }

    #[test]
    fn activation_json() {
        let body = serde_json::to_value(GridCellActivation::new("grid", [11, 2])).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "action": "activate_grid_cell", "grid": "grid", "cell": [11, 2] })
        );
    }
}
