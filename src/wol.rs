//! Wake-on-LAN.
//!
//! Wake signals are unacknowledged, so every wake sends the signal a fixed
//! number of times at a fixed interval and never reports an error.

use std::fmt;
use std::future::Future;
use std::io;
use std::process::Command;
use std::str::FromStr;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;
use crate::errors::Error;
use crate::runtime::{self, AsyncUdpSocket, UdpSocket};

/// Number of times a wake signal is sent.
pub const WAKE_ATTEMPTS: usize = 5;
/// Pause between two wake signals.
pub const WAKE_INTERVAL: Duration = Duration::from_millis(500);

const DEFAULT_BROADCAST: &str = "255.255.255.255";
const DEFAULT_WOL_PORT: u16 = 9;
const ETHER_WAKE: &str = "/usr/sbin/ether-wake";
const WAKEONLAN: &str = "/usr/bin/wakeonlan";

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    /// Accepts `:`, `-` or `.` separators, or none.
    ///
    /// # Examples
    ///
    /// ```
    /// use home_hub_rs::MacAddress;
    ///
    /// let mac: MacAddress = "AA-bb-cc-dd-ee-ff".parse().unwrap();
    /// assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
    /// assert_eq!("aabb.ccdd.eeff".parse::<MacAddress>().unwrap(), mac);
    /// assert!("aa:bb:cc".parse::<MacAddress>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Error> {
        let digits: String = s
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect();
        if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidMac(s.to_string()));
        }
        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::InvalidMac(s.to_string()))?;
        }
        Ok(MacAddress(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Build the 102-byte magic packet: six 0xFF then the address sixteen times.
pub fn magic_packet(mac: &MacAddress) -> Vec<u8> {
    let mut packet = vec![0xff; 6];
    for _ in 0..16 {
        packet.extend_from_slice(&mac.0);
    }
    packet
}

/// How the wake signal is emitted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WakeMethod {
    /// UDP broadcast magic packet from this process.
    #[default]
    #[serde(rename = "native")]
    Native,
    /// `ether-wake`, which can pick the outgoing interface.
    #[serde(rename = "ether-wake", alias = "etherwake")]
    EtherWake,
    /// The `wakeonlan` script.
    #[serde(rename = "wakeonlan")]
    WakeOnLan,
}

/// Outcome of a wake: how many signals were attempted and how many failed locally.
///
/// A wake is never confirmed; zero failures only means every signal left this host.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WakeReport {
    pub attempts: usize,
    pub failures: usize,
}

/// Call `send` `attempts` times, `interval` apart, ignoring failures.
pub async fn repeat_unconfirmed<F, Fut>(attempts: usize, interval: Duration, mut send: F) -> WakeReport
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let mut report = WakeReport::default();
    for attempt in 0..attempts {
        if attempt > 0 {
            runtime::sleep(interval).await;
        }
        report.attempts += 1;
        if let Err(e) = send(attempt).await {
            report.failures += 1;
            warn!("Wake signal {} of {} failed: {}", attempt + 1, attempts, e);
        }
    }
    report
}

/// A generic wake-on-LAN target.
///
/// Without an explicit method, targets with a manual interface are woken with
/// `ether-wake` and all others with a native broadcast.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeOnLan {
    mac: MacAddress,
    /// Broadcast (or unicast) address for native magic packets.
    host: Option<String>,
    port: Option<u16>,
    #[serde(alias = "manual_interface")]
    interface: Option<String>,
    method: Option<WakeMethod>,
}

impl WakeOnLan {
    pub fn new(mac: MacAddress) -> Self {
        WakeOnLan {
            mac,
            host: None,
            port: None,
            interface: None,
            method: None,
        }
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_interface(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_string());
        self
    }

    pub fn with_method(mut self, method: WakeMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn mac(&self) -> &MacAddress {
        &self.mac
    }

    /// Destination of native magic packets.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(
            self.host.as_deref().unwrap_or(DEFAULT_BROADCAST),
            self.port.unwrap_or(DEFAULT_WOL_PORT),
        )
    }

    pub fn method(&self) -> WakeMethod {
        match (self.method, &self.interface) {
            (Some(method), _) => method,
            (None, Some(_)) => WakeMethod::EtherWake,
            (None, None) => WakeMethod::Native,
        }
    }

    /// Send the wake signal [`WAKE_ATTEMPTS`] times, [`WAKE_INTERVAL`] apart.
    pub async fn wake(&self) -> WakeReport {
        debug!("Waking {} via {:?}", self.mac, self.method());
        repeat_unconfirmed(WAKE_ATTEMPTS, WAKE_INTERVAL, move |_| self.send_once()).await
    }

    async fn send_once(&self) -> io::Result<()> {
        match self.method() {
            WakeMethod::Native => self.send_magic_packet().await,
            WakeMethod::EtherWake => {
                let mut args = Vec::new();
                if let Some(interface) = &self.interface {
                    args.push("-i".to_string());
                    args.push(interface.clone());
                }
                args.push(self.mac.to_string());
                run_utility(ETHER_WAKE, args).await
            }
            WakeMethod::WakeOnLan => run_utility(WAKEONLAN, vec![self.mac.to_string()]).await,
        }
    }

    async fn send_magic_packet(&self) -> io::Result<()> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.set_broadcast(true)?;
        socket
            .send_to(&magic_packet(&self.mac), &self.endpoint().address())
            .await
            .map(|_| ())
    }
}

async fn run_utility(program: &'static str, args: Vec<String>) -> io::Result<()> {
    runtime::spawn_blocking(move || {
        let status = Command::new("sudo").arg(program).args(&args).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("{program} exited with {status}")))
        }
    })
    .await
}
