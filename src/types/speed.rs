//! Animation speed for function programs.

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Function program speed, from 1 to 31 (0x1F).
///
/// The value is sent as-is; the bulb counts it downwards, so 0x1F is the
/// first step of the range and 0x01 the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Speed {
    pub(crate) value: u8,
}

impl Default for Speed {
    fn default() -> Self {
        Self::new()
    }
}

impl Speed {
    const MIN: u8 = 1;
    const MAX: u8 = 31;

    /// Create a new Speed with the default value (0x1F).
    ///
    /// # Examples
    ///
    /// ```
    /// use home_hub_rs::Speed;
    ///
    /// assert_eq!(Speed::new().value(), 0x1f);
    /// ```
    pub fn new() -> Self {
        Speed { value: Self::MAX }
    }

    /// Get the speed value.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Create a new Speed with the given value.
    ///
    /// Returns `None` if value is outside the valid range (1-31).
    ///
    /// # Examples
    ///
    /// ```
    /// use home_hub_rs::Speed;
    ///
    /// assert!(Speed::create(0).is_none());
    /// assert!(Speed::create(1).is_some());
    /// assert!(Speed::create(31).is_some());
    /// assert!(Speed::create(32).is_none());
    /// ```
    pub fn create(value: u8) -> Option<Self> {
        if Self::is_valid(value) {
            Some(Speed { value })
        } else {
            None
        }
    }

    /// Create a Speed, using default if value is invalid.
    pub fn create_or(value: u8) -> Self {
        Self::create(value).unwrap_or_default()
    }

    fn is_valid(value: u8) -> bool {
        (Self::MIN..=Self::MAX).contains(&value)
    }
}

impl TryFrom<u8> for Speed {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        Self::create(value).ok_or(Error::InvalidSpeed(value))
    }
}

impl From<Speed> for u8 {
    fn from(speed: Speed) -> u8 {
        speed.value
    }
}
