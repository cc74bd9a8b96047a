//! Powering the device off or rebooting it.

use std::fmt::Debug;
use std::process::Command;
use log::{error, info, warn};

pub trait PowerControl: Debug + Send + Sync {
    fn shutdown(&self);
    fn reboot(&self);
}

/// Runs the configured OS commands. The commands are started and left running: the device is
/// expected to go down, so nothing waits for them.
#[derive(Debug, Clone)]
pub struct SystemPower {
    shutdown: Vec<String>,
    reboot: Vec<String>,
}

impl SystemPower {
    pub fn new(shutdown: Vec<String>, reboot: Vec<String>) -> Self {
        SystemPower { shutdown, reboot }
    }

    fn spawn(what: &str, argv: &[String]) {
        let Some((program, args)) = argv.split_first() else {
            warn!("No {} command configured.", what);
            return;
        };

        info!("Running {} command: {}", what, argv.join(" "));
        match Command::new(program).args(args).spawn() {
            Ok(child) => info!("{} command started (pid {}).", what, child.id()),
            Err(e) => error!("Failed to start {} command: {}", what, e),
        }
    }
}

impl PowerControl for SystemPower {
    fn shutdown(&self) {
        Self::spawn("shutdown", &self.shutdown);
    }

    fn reboot(&self) {
        Self::spawn("reboot", &self.reboot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_failing_commands_are_not_fatal() {
        let power = SystemPower::new(Vec::new(), vec!["/nonexistent/lapkey-reboot".to_string()]);
        power.shutdown();
        power.reboot();
    }

    #[test]
    fn runs_configured_command() {
        let power = SystemPower::new(vec!["true".to_string()], Vec::new());
        power.shutdown();
    }
}
