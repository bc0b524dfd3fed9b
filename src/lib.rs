//! # home_hub_rs
//!
//! An async Rust home-automation hub for MagicHome LED bulbs, desktop
//! computers and wake-on-LAN targets.
//!
//! The crate has two layers:
//!
//! - **Device protocols**: the MagicHome packet codec ([`encode`]), one-shot
//!   TCP bulb sessions ([`Bulb`]), timed brightness ramps ([`ramp`]), the
//!   sunlight model ([`Sunlight`]), wake-on-LAN ([`WakeOnLan`]) and SSH power
//!   control ([`Computer`]).
//! - **Deferred execution**: a [`Hub`] validates an [`Action`] for a device
//!   and hands it to a [`dispatch::Dispatcher`], either a durable spool
//!   drained by [`dispatch::Worker`]s or a fresh process per task. Recurring
//!   work goes through the [`scheduler`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use home_hub_rs::{Bulb, Color, ColorCommand};
//!
//! // Works with any async runtime!
//! async fn warm_white() -> Result<(), home_hub_rs::Error> {
//!     let bulb = Bulb::new("192.168.1.40");
//!     let command = ColorCommand::color(Color::rgbw(255, 120, 0, 80)).with_brightness(200);
//!     let delivery = bulb.change_color(&command).await?;
//!     println!("sent: {}", delivery.is_sent());
//!     Ok(())
//! }
//! ```
//!
//! Dispatching through a configured hub:
//!
//! ```ignore
//! use std::path::Path;
//! use std::time::Duration;
//! use home_hub_rs::{Action, HubConfig};
//!
//! let config = HubConfig::load(Path::new("/etc/home-hub.json"))?;
//! let hub = config.hub(Some(Path::new("/etc/home-hub.json")))?;
//! hub.dispatch("lamp", Action::FadeSunlight { step: 5, header: Default::default() }, Duration::ZERO)?;
//! hub.shutdown();
//! ```
//!
//! ## Communication
//!
//! Bulbs listen on TCP port 5577 and never acknowledge a packet; every command
//! opens a new connection, writes one packet and closes it. Delivery failures
//! are reported as [`Delivery::Failed`], never as errors. Computers are
//! controlled over SSH (port 22) and woken with magic packets on UDP port 9.
//!
//! ## Runtime Selection
//!
//! This library is runtime-agnostic. Select your preferred runtime using feature flags:
//!
//! ### Using tokio (default)
//!
//! ```toml
//! [dependencies]
//! home-hub-rs = "0.1"
//! ```
//!
//! ### Using async-std
//!
//! ```toml
//! [dependencies]
//! home-hub-rs = { version = "0.1", default-features = false, features = ["runtime-async-std"] }
//! ```
//!
//! ### Using smol
//!
//! ```toml
//! [dependencies]
//! home-hub-rs = { version = "0.1", default-features = false, features = ["runtime-smol"] }
//! ```
//!
//! ## Feature Flags
//!
//! - `runtime-tokio` (default): Use the tokio async runtime
//! - `runtime-async-std`: Use the async-std runtime
//! - `runtime-smol`: Use the smol runtime
//! - `cli` (default): Build the `home-hub` binary

mod bulb;
mod command;
mod computer;
mod config;
mod device;
pub mod dispatch;
mod endpoint;
mod errors;
mod history;
mod hub;
mod packet;
pub mod ramp;
pub mod remote;
mod room;
pub mod runtime;
pub mod scheduler;
mod sunlight;
mod types;
mod wol;

// Re-export public API
pub use bulb::{Bulb, Delivery, send_bulb_command};
pub use command::ColorCommand;
pub use computer::{Computer, OsFamily, set_power};
pub use config::{HubConfig, JobConfig, LocalConfig, QueueConfig};
pub use device::{Action, Device, DeviceRegistry};
pub use endpoint::Endpoint;
pub use errors::Error;
pub use history::{DeliveryHistory, DeliveryOutcome, HistoryEntry, HistorySummary};
pub use hub::{Executor, Hub, TaskOutcome};
pub use packet::{Packet, checksum, encode};
pub use ramp::{RampHeader, RampReport};
pub use room::Room;
pub use sunlight::{AmbientSource, Daylight, Location, SunTimes, Sunlight, ambient_white};
pub use types::{Color, Function, Mode, PowerState, Speed};
pub use wol::{MacAddress, WakeMethod, WakeOnLan, WakeReport, magic_packet, repeat_unconfirmed};
