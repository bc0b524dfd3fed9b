//! Packet header modes understood by MagicHome bulbs.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::errors::Error;

/// The header byte that opens every bulb packet.
///
/// `Custom` sequences are part of the bulb protocol but are not produced by
/// [`crate::encode`].
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
    /// Color and white channels (0x31).
    #[default]
    Color = 0x31,
    /// Camera / alternate brightness channels (0x41).
    Camera = 0x41,
    /// Custom 16-step sequence (0x51).
    Custom = 0x51,
    /// Built-in function programs (0x61).
    Function = 0x61,
}

impl Mode {
    /// The wire header byte.
    pub fn header(&self) -> u8 {
        *self as u8
    }

    /// Whether this mode carries red/green/blue/white channels.
    pub fn is_channel(&self) -> bool {
        matches!(self, Mode::Color | Mode::Camera)
    }
}

impl TryFrom<u8> for Mode {
    type Error = Error;

    /// # Examples
    ///
    /// ```
    /// use home_hub_rs::Mode;
    ///
    /// assert_eq!(Mode::try_from(0x61).unwrap(), Mode::Function);
    /// assert!(Mode::try_from(0x22).is_err());
    /// ```
    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            0x31 => Ok(Mode::Color),
            0x41 => Ok(Mode::Camera),
            0x51 => Ok(Mode::Custom),
            0x61 => Ok(Mode::Function),
            other => Err(Error::UnsupportedMode(other)),
        }
    }
}
