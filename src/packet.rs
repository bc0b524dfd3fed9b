//! MagicHome wire packets.
//!
//! ```text
//! -------------------------------------
//! |header(1)|data(5-70)|0f|checksum(1)|
//! -------------------------------------
//! ```
//!
//! Channel packets (color 0x31, camera 0x41) carry red, green, blue, white and
//! a channel-mode byte (0x0F white, 0xF0 color) for 8 bytes total. Function
//! packets (0x61) carry the program code and speed for 5 bytes total.

use std::fmt;

use crate::command::ColorCommand;
use crate::errors::Error;
use crate::types::{Function, Mode};

type Result<T> = std::result::Result<T, Error>;

pub const TAIL: u8 = 0x0f;
const WHITE_CHANNEL: u8 = 0x0f;
const COLOR_CHANNEL: u8 = 0xf0;

/// An encoded packet, checksum included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    bytes: Vec<u8>,
}

impl Packet {
    /// Seal the body by appending the checksum of exactly these bytes.
    fn seal(mut body: Vec<u8>) -> Self {
        body.push(checksum(&body));
        Packet { bytes: body }
    }

    /// Validate raw bytes received from the wire.
    ///
    /// # Examples
    ///
    /// ```
    /// use home_hub_rs::Packet;
    ///
    /// let packet = Packet::parse(&[0x61, 0x1e, 0x0a, 0x0f, 0x98]).unwrap();
    /// assert_eq!(packet.header(), 0x61);
    /// assert!(Packet::parse(&[0x61, 0x1e, 0x0a, 0x0f, 0x00]).is_err());
    /// ```
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        // Header, at least two payload bytes, tail and checksum.
        let [_, _, _, .., tail, sum] = bytes else {
            return Err(Error::InvalidPacket(format!("{} bytes is too short", bytes.len())));
        };
        if *tail != TAIL {
            return Err(Error::InvalidPacket(format!("bad tail 0x{tail:02x}")));
        }
        let expected = checksum(&bytes[..bytes.len() - 1]);
        if *sum != expected {
            return Err(Error::InvalidPacket(format!(
                "checksum 0x{sum:02x} != 0x{expected:02x}"
            )));
        }
        Ok(Packet {
            bytes: bytes.to_vec(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn header(&self) -> u8 {
        self.bytes[0]
    }

    /// Bytes between the header and the tail.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[1..self.bytes.len() - 2]
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Additive checksum over `bytes`, mod 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Scale a channel by brightness, rounding down.
pub fn scale(channel: u8, brightness: u8) -> u8 {
    (u16::from(channel) * u16::from(brightness) / 255) as u8
}

/// Encode a command into its wire packet.
///
/// # Examples
///
/// ```
/// use home_hub_rs::{encode, Color, ColorCommand};
///
/// let packet = encode(&ColorCommand::color(Color::rgb(255, 0, 0))).unwrap();
/// assert_eq!(packet.as_bytes(), &[0x31, 0xff, 0x00, 0x00, 0x00, 0xf0, 0x0f, 0x2f]);
/// ```
pub fn encode(command: &ColorCommand) -> Result<Packet> {
    let mode = command.mode();
    match mode {
        Mode::Function => {
            let code = command.function_code().ok_or(Error::MissingFunction)?;
            if !Function::is_valid(code) {
                return Err(Error::UnsupportedFunction(code));
            }
            Ok(Packet::seal(vec![
                mode.header(),
                code,
                command.speed().value(),
                TAIL,
            ]))
        }
        Mode::Color | Mode::Camera => {
            let color = command.color_value();
            let brightness = command.brightness();
            let white = scale(color.white(), brightness);
            let channel_mode = if white > 0 { WHITE_CHANNEL } else { COLOR_CHANNEL };
            Ok(Packet::seal(vec![
                mode.header(),
                scale(color.red(), brightness),
                scale(color.green(), brightness),
                scale(color.blue(), brightness),
                white,
                channel_mode,
                TAIL,
            ]))
        }
        Mode::Custom => Err(Error::UnsupportedMode(mode.header())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, Speed};

    #[test]
    fn test_red_scenario() {
        let packet = encode(&ColorCommand::color(Color::rgb(255, 0, 0))).unwrap();
        let sum = (0x31u32 + 0xff + 0xf0 + 0x0f) % 256;
        assert_eq!(
            packet.as_bytes(),
            &[0x31, 0xff, 0x00, 0x00, 0x00, 0xf0, 0x0f, sum as u8]
        );
    }

    #[test]
    fn test_function_scenario() {
        let command = ColorCommand::function(Function::create(30).unwrap(), Speed::create(10).unwrap());
        let packet = encode(&command).unwrap();
        let sum = (0x61u32 + 0x1e + 0x0a + 0x0f) % 256;
        assert_eq!(packet.as_bytes(), &[0x61, 0x1e, 0x0a, 0x0f, sum as u8]);
    }

    #[test]
    fn test_color_checksum_for_all_brightness() {
        for brightness in 0..=255u8 {
            for channel in [0u8, 1, 17, 128, 254, 255] {
                let command = ColorCommand::color(Color::rgbw(channel, 255 - channel, channel, channel / 2))
                    .with_brightness(brightness);
                let packet = encode(&command).unwrap();
                assert_eq!(packet.len(), 8);
                assert_eq!(packet.checksum(), checksum(&packet.as_bytes()[..7]));
            }
        }
    }

    #[test]
    fn test_function_range() {
        for code in 0..=255u8 {
            let command = ColorCommand::raw(Color::default(), 255, Mode::Function, Some(code), Speed::new());
            match encode(&command) {
                Ok(packet) => {
                    assert!((25..=38).contains(&code));
                    assert_eq!(packet.len(), 5);
                }
                Err(e) => {
                    assert!(!(25..=38).contains(&code));
                    assert_eq!(e, Error::UnsupportedFunction(code));
                }
            }
        }
    }

    #[test]
    fn test_function_mode_requires_code() {
        let command = ColorCommand::raw(Color::default(), 255, Mode::Function, None, Speed::new());
        assert_eq!(encode(&command), Err(Error::MissingFunction));
    }

    #[test]
    fn test_color_mode_ignores_function() {
        let command = ColorCommand::raw(Color::rgb(1, 2, 3), 255, Mode::Color, Some(99), Speed::new());
        assert_eq!(encode(&command).unwrap().len(), 8);
    }

    #[test]
    fn test_custom_mode_unsupported() {
        let command = ColorCommand::color(Color::rgb(1, 2, 3)).with_mode(Mode::Custom);
        assert_eq!(encode(&command), Err(Error::UnsupportedMode(0x51)));
    }

    #[test]
    fn test_scaling_is_monotonic() {
        for channel in 0..=255u8 {
            let mut previous = 0;
            for brightness in 0..=255u8 {
                let scaled = scale(channel, brightness);
                assert!(scaled >= previous);
                previous = scaled;
            }
            assert_eq!(scale(channel, 255), channel);
        }
    }

    #[test]
    fn test_white_channel_mode() {
        let packet = encode(&ColorCommand::white(200)).unwrap();
        assert_eq!(packet.payload(), &[0, 0, 0, 200, 0x0f]);
        let dimmed = encode(&ColorCommand::white(1).with_brightness(100)).unwrap();
        assert_eq!(dimmed.payload(), &[0, 0, 0, 0, 0xf0]);
    }

    #[test]
    fn test_camera_header() {
        let packet = encode(&ColorCommand::white(10).with_mode(Mode::Camera)).unwrap();
        assert_eq!(packet.header(), 0x41);
    }

    #[test]
    fn test_parse_round_trip() {
        let packet = encode(&ColorCommand::color(Color::rgb(9, 8, 7))).unwrap();
        assert_eq!(Packet::parse(packet.as_bytes()).unwrap(), packet);
        assert!(Packet::parse(&[0x0f]).is_err());
        assert!(Packet::parse(&[0x31, 0x00, 0x31]).is_err());
    }

    #[test]
    fn test_parse_rejects_short_frames() {
        // Tail and checksum are valid, but there is no room for a payload.
        assert!(matches!(
            Packet::parse(&[0x31, 0x0f, 0x40]),
            Err(Error::InvalidPacket(_))
        ));
        assert!(matches!(
            Packet::parse(&[0x61, 0x1e, 0x0f, 0x8e]),
            Err(Error::InvalidPacket(_))
        ));
        let shortest = Packet::parse(&[0x61, 0x1e, 0x0a, 0x0f, 0x98]).unwrap();
        assert_eq!(shortest.payload(), &[0x1e, 0x0a]);
    }
}
