//! Power state for computers and wake targets.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::errors::Error;

/// Requested power state for a compute endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PowerState {
    /// Wake the machine
    On,
    /// Shut the machine down
    Off,
    /// Suspend the machine
    #[serde(alias = "suspend")]
    Sleep,
    /// Reboot the machine
    #[serde(alias = "reboot")]
    Restart,
}

impl FromStr for PowerState {
    type Err = Error;

    /// # Examples
    ///
    /// ```
    /// use home_hub_rs::PowerState;
    ///
    /// assert_eq!("suspend".parse::<PowerState>().unwrap(), PowerState::Sleep);
    /// assert_eq!("REBOOT".parse::<PowerState>().unwrap(), PowerState::Restart);
    /// assert!("hibernate".parse::<PowerState>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "on" => Ok(PowerState::On),
            "off" => Ok(PowerState::Off),
            "sleep" | "suspend" => Ok(PowerState::Sleep),
            "restart" | "reboot" => Ok(PowerState::Restart),
            _ => Err(Error::UnsupportedState(s.to_string())),
        }
    }
}
