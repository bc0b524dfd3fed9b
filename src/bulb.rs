//! MagicHome bulb sessions.

use std::io;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::command::ColorCommand;
use crate::endpoint::{Endpoint, default_bulb_port};
use crate::errors::Error;
use crate::history::{DeliveryHistory, DeliveryOutcome};
use crate::packet::{Packet, encode};
use crate::ramp::{self, RampHeader, RampReport};
use crate::runtime::{AsyncTcpStream, Mutex, TcpStream};
use crate::sunlight::AmbientSource;

type Result<T> = std::result::Result<T, Error>;

/// Outcome of a single fire-and-forget packet delivery.
///
/// Bulbs never acknowledge packets, so `Sent` only means the bytes were
/// handed to the network stack.
#[derive(Debug)]
pub enum Delivery {
    Sent,
    Failed(io::Error),
}

impl Delivery {
    pub fn is_sent(&self) -> bool {
        matches!(self, Delivery::Sent)
    }
}

/// Represents a single MagicHome LED bulb.
///
/// Every command opens a new TCP connection to the bulb, writes one packet and
/// closes the connection. There is no pooling and no acknowledgment channel.
///
/// # Example
///
/// ```
/// use home_hub_rs::Bulb;
///
/// let bulb = Bulb::new("192.168.1.123");
/// assert_eq!(bulb.endpoint().port, 5577);
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct Bulb {
    host: String,
    #[serde(default = "default_bulb_port")]
    port: u16,
    #[serde(skip)]
    history: Arc<Mutex<DeliveryHistory>>,
}

impl Clone for Bulb {
    fn clone(&self) -> Self {
        // try_lock API differs between runtimes:
        // - tokio returns Result<Guard, TryLockError>
        // - async-std and async-lock (smol) return Option<Guard>
        #[cfg(feature = "runtime-tokio")]
        let history_clone = match self.history.try_lock() {
            Ok(guard) => guard.clone(),
            Err(_) => DeliveryHistory::new(),
        };
        #[cfg(any(feature = "runtime-async-std", feature = "runtime-smol"))]
        let history_clone = match self.history.try_lock() {
            Some(guard) => guard.clone(),
            None => DeliveryHistory::new(),
        };
        Bulb {
            host: self.host.clone(),
            port: self.port,
            history: Arc::new(Mutex::new(history_clone)),
        }
    }
}

impl Bulb {
    pub fn new(host: &str) -> Self {
        Self::with_endpoint(Endpoint::bulb(host))
    }

    pub fn with_endpoint(endpoint: Endpoint) -> Self {
        Bulb {
            host: endpoint.host,
            port: endpoint.port,
            history: Arc::new(Mutex::new(DeliveryHistory::new())),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(&self.host, self.port)
    }

    pub async fn history(&self) -> DeliveryHistory {
        self.history.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    /// Deliver an encoded packet. Never fails; a failed delivery is logged and
    /// returned.
    pub async fn send(&self, packet: &Packet) -> Delivery {
        let outcome = match deliver(&self.endpoint(), packet).await {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                warn!("Delivery to bulb {} failed: {}", self.endpoint(), e);
                Delivery::Failed(e)
            }
        };

        let mut history = self.history.lock().await;
        match &outcome {
            Delivery::Sent => history.record(DeliveryOutcome::Sent, &packet.to_hex()),
            Delivery::Failed(e) => {
                history.record(DeliveryOutcome::Failed, &packet.to_hex());
                history.record_error(&e.to_string());
            }
        }
        outcome
    }

    /// Encode and deliver a command.
    ///
    /// Invalid commands fail before any I/O; delivery failures are logged and
    /// reported through the returned [`Delivery`].
    pub async fn change_color(&self, command: &ColorCommand) -> Result<Delivery> {
        let packet = encode(command)?;
        debug!("Sending {} to {}", packet, self.endpoint());
        Ok(self.send(&packet).await)
    }

    /// Set the white channel to the current ambient level.
    pub async fn sunlight(&self, ambient: &dyn AmbientSource) -> Result<Delivery> {
        let white = ramp::clamp_white(ambient.ambient_brightness(Utc::now()));
        self.change_color(&ColorCommand::white(white)).await
    }

    /// Ramp brightness down through `start` and/or up through `stop`.
    pub async fn fade(
        &self,
        start: Option<&ColorCommand>,
        stop: Option<&ColorCommand>,
        step: u8,
        header: RampHeader,
    ) -> Result<RampReport> {
        ramp::fade(self, start, stop, step, header).await
    }

    /// Fade up to the current ambient white level.
    pub async fn fade_sunlight(
        &self,
        ambient: &dyn AmbientSource,
        step: u8,
        header: RampHeader,
    ) -> Result<RampReport> {
        ramp::fade_to_ambient(self, ambient, Utc::now(), step, header).await
    }
}

/// Encode and deliver a command to an endpoint without keeping a [`Bulb`].
pub async fn send_bulb_command(endpoint: &Endpoint, command: &ColorCommand) -> Result<Delivery> {
    Bulb::with_endpoint(endpoint.clone()).change_color(command).await
}

async fn deliver(endpoint: &Endpoint, packet: &Packet) -> io::Result<()> {
    let mut stream = TcpStream::connect(&endpoint.address()).await?;
    stream.write_all(packet.as_bytes()).await?;
    stream.close().await
}
