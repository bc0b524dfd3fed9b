//! Timed brightness ramps.
//!
//! A ramp sends one packet per brightness step, sequentially, over a fresh
//! connection each time. A full ramp takes `255 / step` round trips and blocks
//! the task running it for that long, so ramps are meant to run through the
//! dispatcher rather than on a request path.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::bulb::{Bulb, Delivery};
use crate::command::ColorCommand;
use crate::errors::Error;
use crate::packet::encode;
use crate::sunlight::AmbientSource;
use crate::types::Mode;

type Result<T> = std::result::Result<T, Error>;

const MAX_BRIGHTNESS: u8 = 255;

/// Header used for ramp packets.
///
/// Ramps have been driven with the camera header (0x41) on some hardware;
/// which header a given bulb expects has not been verified, so it is
/// selectable.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampHeader {
    #[default]
    Color,
    Camera,
}

impl From<RampHeader> for Mode {
    fn from(header: RampHeader) -> Mode {
        match header {
            RampHeader::Color => Mode::Color,
            RampHeader::Camera => Mode::Camera,
        }
    }
}

/// Deliveries made by a ramp.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RampReport {
    pub sent: usize,
    pub failed: usize,
}

impl RampReport {
    pub fn total(&self) -> usize {
        self.sent + self.failed
    }

    fn record(&mut self, delivery: &Delivery) {
        if delivery.is_sent() {
            self.sent += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Brightness levels from 255 down by `step`, stopping before 0.
///
/// # Examples
///
/// ```
/// use home_hub_rs::ramp::fade_out_levels;
///
/// let levels = fade_out_levels(100);
/// assert_eq!(levels, vec![255, 155, 55]);
/// ```
pub fn fade_out_levels(step: u8) -> Vec<u8> {
    if step == 0 {
        return Vec::new();
    }
    let mut levels = Vec::new();
    let mut level = i32::from(MAX_BRIGHTNESS);
    while level > 0 {
        levels.push(level as u8);
        level -= i32::from(step);
    }
    levels
}

/// Brightness levels from 0 up by `step`, stopping before 255.
pub fn fade_in_levels(step: u8) -> Vec<u8> {
    if step == 0 {
        return Vec::new();
    }
    let mut levels = Vec::new();
    let mut level = 0i32;
    while level < i32::from(MAX_BRIGHTNESS) {
        levels.push(level as u8);
        level += i32::from(step);
    }
    levels
}

/// Clamp an ambient white level to a channel value.
pub fn clamp_white(level: i32) -> u8 {
    level.clamp(0, i32::from(MAX_BRIGHTNESS)) as u8
}

/// Fade `start` out from full brightness, then fade `stop` in from zero.
///
/// Both commands are validated before the first packet is sent.
pub async fn fade(
    bulb: &Bulb,
    start: Option<&ColorCommand>,
    stop: Option<&ColorCommand>,
    step: u8,
    header: RampHeader,
) -> Result<RampReport> {
    if step == 0 {
        return Err(Error::InvalidStep);
    }
    let start = start.map(|c| c.clone().with_mode(header.into()));
    let stop = stop.map(|c| c.clone().with_mode(header.into()));
    for command in start.iter().chain(stop.iter()) {
        encode(command)?;
    }

    let mut report = RampReport::default();
    if let Some(command) = &start {
        run_levels(bulb, command, &fade_out_levels(step), &mut report).await?;
    }
    if let Some(command) = &stop {
        run_levels(bulb, command, &fade_in_levels(step), &mut report).await?;
    }
    debug!(
        "Ramp on {} finished: {} sent, {} failed",
        bulb.endpoint(),
        report.sent,
        report.failed
    );
    Ok(report)
}

/// Fade the white channel in towards the ambient level at `now`.
pub async fn fade_to_ambient(
    bulb: &Bulb,
    ambient: &dyn AmbientSource,
    now: DateTime<Utc>,
    step: u8,
    header: RampHeader,
) -> Result<RampReport> {
    let level = ambient.ambient_brightness(now);
    let white = clamp_white(level);
    debug!("Ambient level {} (white {}) for {}", level, white, bulb.endpoint());
    fade(bulb, None, Some(&ColorCommand::white(white)), step, header).await
}

async fn run_levels(
    bulb: &Bulb,
    command: &ColorCommand,
    levels: &[u8],
    report: &mut RampReport,
) -> Result<()> {
    for level in levels {
        let packet = encode(&command.clone().with_brightness(*level))?;
        let delivery = bulb.send(&packet).await;
        report.record(&delivery);
    }
    Ok(())
}
