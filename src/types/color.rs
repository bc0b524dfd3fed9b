//! RGB and RGBW color representations.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::Error;

/// An RGBW color with red, green, blue and white components (0-255 each).
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    #[serde(default)]
    pub(crate) red: u8,
    #[serde(default)]
    pub(crate) green: u8,
    #[serde(default)]
    pub(crate) blue: u8,
    #[serde(default)]
    pub(crate) white: u8,
}

impl Color {
    /// Create a color with the given RGB values and the white channel off.
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red,
            green,
            blue,
            white: 0,
        }
    }

    /// Create a color with all four channels.
    pub fn rgbw(red: u8, green: u8, blue: u8, white: u8) -> Self {
        Self {
            red,
            green,
            blue,
            white,
        }
    }

    /// Create a color driving only the white channel.
    pub fn white_only(white: u8) -> Self {
        Self::rgbw(0, 0, 0, white)
    }

    /// Create a default color (off: 0,0,0,0).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }

    pub fn white(&self) -> u8 {
        self.white
    }

    /// Parse a `#rrggbb` hex string (the `#` is optional).
    ///
    /// # Examples
    ///
    /// ```
    /// use home_hub_rs::Color;
    ///
    /// let color = Color::from_hex("#ff8000").unwrap();
    /// assert_eq!((color.red(), color.green(), color.blue()), (255, 128, 0));
    /// assert!(Color::from_hex("ff80").is_err());
    /// ```
    pub fn from_hex(hex: &str) -> Result<Self, Error> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidColorString(hex.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| Error::InvalidColorString(hex.to_string()))
        };
        Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl FromStr for Color {
    type Err = Error;

    /// Parse from comma-separated string (e.g., "255,128,0" or "0,0,0,255").
    fn from_str(s: &str) -> Result<Self, Error> {
        let parts = s
            .split(',')
            .map(|c| c.trim().parse::<u8>())
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| Error::InvalidColorString(s.to_string()))?;
        match parts.as_slice() {
            [r, g, b] => Ok(Self::rgb(*r, *g, *b)),
            [r, g, b, w] => Ok(Self::rgbw(*r, *g, *b, *w)),
            _ => Err(Error::InvalidColorString(s.to_string())),
        }
    }
}
