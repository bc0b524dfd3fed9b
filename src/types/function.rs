//! Built-in bulb function programs.

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// A built-in function program code, from 25 (0x19) to 38 (0x26).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Function {
    pub(crate) code: u8,
}

impl Function {
    pub const MIN: u8 = 25;
    pub const MAX: u8 = 38;

    pub fn code(&self) -> u8 {
        self.code
    }

    /// Returns None if the code is outside the valid range (25-38).
    ///
    /// # Examples
    ///
    /// ```
    /// use home_hub_rs::Function;
    ///
    /// assert!(Function::create(24).is_none());
    /// assert!(Function::create(25).is_some());
    /// assert!(Function::create(38).is_some());
    /// assert!(Function::create(39).is_none());
    /// ```
    pub fn create(code: u8) -> Option<Self> {
        if Self::is_valid(code) {
            Some(Function { code })
        } else {
            None
        }
    }

    pub(crate) fn is_valid(code: u8) -> bool {
        (Self::MIN..=Self::MAX).contains(&code)
    }
}

impl TryFrom<u8> for Function {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Error> {
        Self::create(code).ok_or(Error::UnsupportedFunction(code))
    }
}

impl From<Function> for u8 {
    fn from(function: Function) -> u8 {
        function.code
    }
}
