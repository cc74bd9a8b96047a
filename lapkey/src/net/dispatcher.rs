use std::fmt::{Debug, Formatter};
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use log::{debug, error, info, warn};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use crate::config::{Config, NetworkConfig, PresentationConfig, RetryPolicy};
use crate::indicator::Indicator;
use crate::net::{lap_count_telegram, Dispatch, DispatchError, GridCellActivation, PresentationAction};

/// Sends commands over HTTP and TCP.
///
/// Each HTTP request and each TCP attempt uses its own connection, so the dispatcher can be
/// shared between threads.
pub struct NetworkDispatcher<'a> {
    client: Client,
    network: &'a NetworkConfig,
    presentation: &'a PresentationConfig,
    retry: RetryPolicy,
    indicator: &'a Indicator<'a>,
}

impl <'a> NetworkDispatcher<'a> {
    pub fn new(config: &'a Config, indicator: &'a Indicator<'a>) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.presentation.accept_invalid_certs)
            .timeout(config.network.http_timeout())
            .build()?;

        Ok(NetworkDispatcher {
            client,
            network: &config.network,
            presentation: &config.presentation,
            retry: config.retry,
            indicator,
        })
    }

    /// POSTs an empty request to the presentation endpoint for `action`.
    ///
    /// Anything but `200 OK` is an error.
    pub fn send_presentation(&self, action: PresentationAction) -> Result<StatusCode, DispatchError> {
        let url = match action {
            PresentationAction::Clear => &self.presentation.clear_url,
            PresentationAction::Trigger => &self.presentation.trigger_url,
        };

        let status = self.client.post(url).send()?.status();
        if status != StatusCode::OK {
            return Err(DispatchError::Status(status));
        }
        Ok(status)
    }

    /// POSTs a grid-cell activation to `http://{server_host}:{port}/` and returns the response status.
    pub fn send_grid_cell(&self, port: u16, activation: &GridCellActivation) -> Result<StatusCode, DispatchError> {
        let url = format!("http://{}:{}/", self.network.server_host, port);
        let response = self.client.post(&url).json(activation).send()?;
        Ok(response.status())
    }

    /// Sends `payload` over a fresh TCP connection to the lap-count port, retrying on failure.
    ///
    /// Each failed attempt blinks the indicator twice, and all but the last one are followed
    /// by the retry delay. Returns the number of the attempt that succeeded.
    pub fn deliver(&self, payload: &[u8]) -> Result<u32, DispatchError> {
        let attempts = self.retry.attempts;

        for attempt in 1..=attempts {
            match self.send_tcp(payload) {
                Ok(()) => return Ok(attempt),
                Err(e) => {
                    warn!(
                        "TCP delivery to {}:{} failed (attempt {}/{}): {}",
                        self.network.server_host, self.network.lap_count_port, attempt, attempts, e
                    );
                    self.indicator.pulse_times(2);
                    if attempt < attempts {
                        thread::sleep(self.retry.delay());
                    }
                }
            }
        }

        Err(DispatchError::Exhausted(attempts))
    }

    fn send_tcp(&self, payload: &[u8]) -> Result<(), DispatchError> {
        let host = self.network.server_host.as_str();
        let port = self.network.lap_count_port;

        let mut stream = match self.network.connect_timeout() {
            Some(timeout) => {
                let addr = (host, port)
                    .to_socket_addrs()?
                    .next()
                    .ok_or_else(|| DispatchError::Resolve(format!("{}:{}", host, port)))?;
                TcpStream::connect_timeout(&addr, timeout)?
            }
            None => TcpStream::connect((host, port))?,
        };

        // The stream is closed when dropped, whether the write went through or not.
        stream.write_all(payload)?;
        stream.flush()?;
        Ok(())
    }
}

impl Dispatch for NetworkDispatcher<'_> {
    fn notify_presentation(&self, action: PresentationAction) {
        match self.send_presentation(action) {
            Ok(_) => info!("Presentation {} sent.", action),
            Err(e) => warn!("Presentation {} failed: {}", action, e),
        }
    }

    fn activate_grid_cell(&self, port: u16, activation: &GridCellActivation) {
        match self.send_grid_cell(port, activation) {
            Ok(status) => info!(
                "Grid cell {:?} sent to port {}, response: {}",
                activation.cell, port, status
            ),
            Err(e) => warn!("Grid cell {:?} request failed: {}", activation.cell, e),
        }
    }

    fn deliver_lap_count(&self, count: &str) {
        let telegram = lap_count_telegram(count);
        match self.deliver(telegram.as_bytes()) {
            Ok(attempt) => debug!("Lap count {} delivered on attempt {}.", count, attempt),
            Err(e) => error!("Lap count {} not delivered: {}", count, e),
        }
    }
}

impl Debug for NetworkDispatcher<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "NetworkDispatcher({})", self.network.server_host)
    }
}
