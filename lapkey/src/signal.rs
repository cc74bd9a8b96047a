//! Turns SIGINT and SIGTERM into a cleared `running` flag, so the loops can wind down and
//! release the GPIO lines themselves.
//!
//! Once the signals are taken over the default handlers are gone, so a stop that hangs would
//! leave the process unkillable short of SIGKILL. A second signal, or the grace period running
//! out, exits the process without waiting for the loops.

use std::future::{pending, Future};
use std::io;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use log::{error, info, warn};
use tokio::signal::unix::{signal, SignalKind};

/// Exit code after an interrupt that did not stop in an orderly way.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Why the watcher gave up on an orderly stop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Escalation {
    /// Another signal came in while stopping.
    Repeated,
    /// Still running when the grace period ran out.
    GraceExpired,
}

pub fn spawn_interrupt_watcher(running: Arc<AtomicBool>, grace: Duration) -> io::Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            match runtime.block_on(supervise(next_signal, &running, grace)) {
                Escalation::Repeated => warn!("Interrupted again, exiting without releasing GPIO."),
                Escalation::GraceExpired => {
                    error!("Still running {:?} after the interrupt, exiting without releasing GPIO.", grace)
                }
            }
            process::exit(INTERRUPTED_EXIT_CODE);
        })
}

/// Waits for a signal and clears `running`, then waits for whatever comes first: another
/// signal or the end of `grace`.
///
/// Normally the process is gone before this returns.
pub async fn supervise<F, Fut>(mut next_signal: F, running: &AtomicBool, grace: Duration) -> Escalation
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    next_signal().await;
    running.store(false, Ordering::SeqCst);
    info!("Stopping, signal again to exit immediately.");

    tokio::select! {
        _ = next_signal() => Escalation::Repeated,
        _ = tokio::time::sleep(grace) => Escalation::GraceExpired,
    }
}

async fn next_signal() {
    tokio::select! {
        _ = wait_ctrl_c() => info!("Interrupted by user."),
        _ = wait_terminate() => info!("Terminated."),
    }
}

async fn wait_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl-C: {}", e);
        // SIGTERM may still arrive.
        pending::<()>().await
    }
}

async fn wait_terminate() {
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Cannot listen for SIGTERM: {}", e);
            pending::<()>().await
        }
    }
}
