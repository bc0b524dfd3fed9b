//! Room grouping for batch bulb operations.

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::bulb::{Bulb, Delivery};
use crate::command::ColorCommand;
use crate::errors::Error;
use crate::packet::encode;
use crate::ramp::{RampHeader, RampReport};
use crate::sunlight::AmbientSource;

type Result<T> = std::result::Result<T, Error>;

/// A named group of bulbs addressed as one device.
///
/// Every bulb in a room gets the same command; deliveries run concurrently,
/// one connection per bulb.
///
/// # Example
///
/// ```
/// use home_hub_rs::{Bulb, Room};
///
/// let mut room = Room::new("Living Room");
/// room.add_bulb(Bulb::new("172.16.42.199")).unwrap();
/// room.add_bulb(Bulb::new("172.16.42.200")).unwrap();
/// assert!(room.add_bulb(Bulb::new("172.16.42.200")).is_err());
/// assert_eq!(room.bulbs().len(), 2);
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(try_from = "RoomConfig")]
pub struct Room {
    name: String,
    bulbs: Vec<Bulb>,
}

/// Room as written in a config file, before endpoints are checked.
#[derive(Deserialize)]
struct RoomConfig {
    name: String,
    #[serde(default)]
    bulbs: Vec<Bulb>,
}

impl TryFrom<RoomConfig> for Room {
    type Error = Error;

    fn try_from(config: RoomConfig) -> Result<Self> {
        let mut room = Room::new(&config.name);
        for bulb in config.bulbs {
            room.add_bulb(bulb)?;
        }
        Ok(room)
    }
}

impl Room {
    /// Create a new room with the given name.
    pub fn new(name: &str) -> Self {
        Room {
            name: String::from(name),
            bulbs: Vec::new(),
        }
    }

    /// Get the name of this room.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bulbs(&self) -> &[Bulb] {
        &self.bulbs
    }

    /// Add a bulb; two bulbs may not share an endpoint.
    pub fn add_bulb(&mut self, bulb: Bulb) -> Result<()> {
        let endpoint = bulb.endpoint();
        if self.bulbs.iter().any(|known| known.endpoint() == endpoint) {
            return Err(Error::invalid_endpoint(&endpoint, "already in the room"));
        }
        self.bulbs.push(bulb);
        Ok(())
    }

    /// Remove the bulb at `host`. Returns `true` if one was removed.
    pub fn remove_bulb(&mut self, host: &str) -> bool {
        let before = self.bulbs.len();
        self.bulbs.retain(|bulb| bulb.host() != host);
        self.bulbs.len() != before
    }

    /// Send the same command to every bulb in the room.
    pub async fn change_color(&self, command: &ColorCommand) -> Result<Vec<Delivery>> {
        let packet = encode(command)?;
        Ok(join_all(self.bulbs.iter().map(|bulb| bulb.send(&packet))).await)
    }

    /// Set every bulb's white channel to the ambient level.
    pub async fn sunlight(&self, ambient: &dyn AmbientSource) -> Result<Vec<Delivery>> {
        let results = join_all(self.bulbs.iter().map(|bulb| bulb.sunlight(ambient))).await;
        results.into_iter().collect()
    }

    /// Run the same ramp on every bulb concurrently.
    pub async fn fade(
        &self,
        start: Option<&ColorCommand>,
        stop: Option<&ColorCommand>,
        step: u8,
        header: RampHeader,
    ) -> Result<RampReport> {
        let reports = join_all(
            self.bulbs
                .iter()
                .map(|bulb| bulb.fade(start, stop, step, header)),
        )
        .await;
        merge(reports)
    }

    pub async fn fade_sunlight(
        &self,
        ambient: &dyn AmbientSource,
        step: u8,
        header: RampHeader,
    ) -> Result<RampReport> {
        let reports = join_all(
            self.bulbs
                .iter()
                .map(|bulb| bulb.fade_sunlight(ambient, step, header)),
        )
        .await;
        merge(reports)
    }
}

fn merge(reports: Vec<Result<RampReport>>) -> Result<RampReport> {
    reports.into_iter().try_fold(RampReport::default(), |acc, report| {
        let report = report?;
        Ok(RampReport {
            sent: acc.sent + report.sent,
            failed: acc.failed + report.failed,
        })
    })
}
