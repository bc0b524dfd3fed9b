//! Bulb commands.

use serde::{Deserialize, Serialize};

use crate::types::{Color, Function, Mode, Speed};

/// A single command for a MagicHome bulb.
///
/// Commands are built per invocation and are immutable once built: the
/// constructors pick the mode and the `with_*` methods consume and return a
/// new command.
///
/// # Creating Commands
///
/// 1. **Channel commands** scale every channel by `brightness`:
///    ```
///    use home_hub_rs::{Color, ColorCommand};
///    let command = ColorCommand::color(Color::rgb(255, 0, 0)).with_brightness(128);
///    assert_eq!(command.brightness(), 128);
///    ```
///
/// 2. **Function commands** start a built-in program:
///    ```
///    use home_hub_rs::{ColorCommand, Function, Mode, Speed};
///    let command = ColorCommand::function(Function::create(30).unwrap(), Speed::create(10).unwrap());
///    assert_eq!(command.mode(), Mode::Function);
///    ```
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorCommand {
    #[serde(flatten)]
    color: Color,
    #[serde(default = "ColorCommand::full_brightness")]
    brightness: u8,
    #[serde(default)]
    mode: Mode,
    function: Option<u8>,
    #[serde(default)]
    speed: Speed,
}

impl Default for ColorCommand {
    fn default() -> Self {
        Self::color(Color::default())
    }
}

impl ColorCommand {
    const FULL_BRIGHTNESS: u8 = 255;

    fn full_brightness() -> u8 {
        Self::FULL_BRIGHTNESS
    }

    /// A color/white channel command at full brightness.
    pub fn color(color: Color) -> Self {
        ColorCommand {
            color,
            brightness: Self::FULL_BRIGHTNESS,
            mode: Mode::Color,
            function: None,
            speed: Speed::default(),
        }
    }

    /// A white-only channel command at full brightness.
    pub fn white(white: u8) -> Self {
        Self::color(Color::white_only(white))
    }

    /// A function program command.
    pub fn function(function: Function, speed: Speed) -> Self {
        ColorCommand {
            color: Color::default(),
            brightness: Self::FULL_BRIGHTNESS,
            mode: Mode::Function,
            function: Some(function.code()),
            speed,
        }
    }

    /// A command with an arbitrary header and raw function code.
    ///
    /// Nothing is validated here; [`crate::encode`] rejects unsupported modes
    /// and out-of-range function codes.
    pub fn raw(color: Color, brightness: u8, mode: Mode, function: Option<u8>, speed: Speed) -> Self {
        ColorCommand {
            color,
            brightness,
            mode,
            function,
            speed,
        }
    }

    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = brightness;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn color_value(&self) -> &Color {
        &self.color
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The raw function code, if one was set.
    pub fn function_code(&self) -> Option<u8> {
        self.function
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_defaults() {
        let command: ColorCommand = serde_json::from_value(json!({"white": 200})).unwrap();
        assert_eq!(command, ColorCommand::white(200));
    }

    #[test]
    fn test_function_command_serializes_code() {
        let command = ColorCommand::function(Function::create(37).unwrap(), Speed::create(3).unwrap());
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["mode"], "function");
        assert_eq!(value["function"], 37);
        assert_eq!(value["speed"], 3);
    }
}
