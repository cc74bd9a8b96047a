//! Startup gate: nothing touches the GPIO until the network answers.

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use log::trace;

/// Tries one TCP connection to `addr`. Any failure, including name resolution, counts as down.
pub fn probe(addr: &str, timeout: Duration) -> bool {
    let addrs = match addr.to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            trace!("Cannot resolve {}: {}", addr, e);
            return false;
        }
    };

    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => return true,
            Err(e) => trace!("Probe of {} failed: {}", addr, e),
        }
    }
    false
}

/// Blocks until [probe] succeeds, trying every `interval`.
///
/// Returns `false` without waiting further once `running` is cleared.
pub fn wait_for_network(addr: &str, interval: Duration, running: &AtomicBool) -> bool {
    while running.load(Ordering::SeqCst) {
        if probe(addr, interval) {
            return true;
        }
        thread::sleep(interval);
    }
    false
}
