use std::path::PathBuf;

use crate::endpoint::Endpoint;

/// All error types that can occur when driving devices through the hub.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to serialize data to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// Failed to deserialize JSON data.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// The packet header is not one the codec can encode.
    #[error("unsupported mode 0x{0:02x}")]
    UnsupportedMode(u8),

    /// The function code lies outside 25..=38.
    #[error("unsupported function {0}")]
    UnsupportedFunction(u8),

    /// A function packet was requested without a function code.
    #[error("function mode requires a function code")]
    MissingFunction,

    /// Function speed outside 1..=31.
    #[error("invalid speed {0}; expected 1-31")]
    InvalidSpeed(u8),

    /// The requested power state is not one of on/off/sleep/restart.
    #[error("unsupported power state {0:?}")]
    UnsupportedState(String),

    /// A brightness ramp needs a step of at least 1.
    #[error("ramp step must be greater than zero")]
    InvalidStep,

    /// Received bytes are not a well-formed bulb packet.
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    /// Failed to parse a MAC address.
    #[error("invalid mac address: {0}")]
    InvalidMac(String),

    /// Failed to parse a [`crate::Color`] from a string.
    #[error("invalid color string: {0}")]
    InvalidColorString(String),

    /// Failed to parse a cron expression.
    #[error("invalid cron expression {expr:?}: {reason}")]
    InvalidCron { expr: String, reason: String },

    /// A remote shell command could not be executed (connection or authentication failure).
    #[error("remote command {command:?} on {host} failed: {reason}")]
    RemoteCommand {
        host: String,
        command: String,
        reason: String,
    },

    /// The task could not be handed to the dispatch backend.
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// A local task process could not be spawned.
    #[error("failed to spawn task process: {0:?}")]
    Spawn(std::io::Error),

    /// The endpoint cannot be used (e.g., already in use).
    #[error("endpoint {endpoint} is invalid because it is {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The device id is not present in the registry.
    #[error("device not found {0}")]
    DeviceNotFound(String),

    /// The device does not implement the requested action.
    #[error("{kind} device cannot perform {method}")]
    UnsupportedAction { kind: String, method: String },

    /// The trigger can never fire (e.g., a zero interval).
    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),

    /// A job with the same id is already scheduled.
    #[error("job {0} is already scheduled")]
    DuplicateJob(String),

    /// Sunlight actions need a configured location.
    #[error("no location configured for sunlight calculation")]
    MissingLocation,

    /// Failed to read the configuration file.
    #[error("failed to read config {path:?}: {err:?}")]
    ConfigRead { path: PathBuf, err: std::io::Error },
}

impl Error {
    /// Create a new remote command error
    pub fn remote(host: &str, command: &str, reason: impl Into<String>) -> Self {
        Error::RemoteCommand {
            host: host.to_string(),
            command: command.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a new dispatch error
    pub fn dispatch(action: &str, err: impl std::fmt::Display) -> Self {
        Error::Dispatch(format!("{action}: {err}"))
    }

    /// Create a new invalid endpoint error
    pub fn invalid_endpoint(endpoint: &Endpoint, reason: &str) -> Self {
        Error::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a new unsupported action error
    pub fn unsupported_action(kind: &str, method: &str) -> Self {
        Error::UnsupportedAction {
            kind: kind.to_string(),
            method: method.to_string(),
        }
    }

    /// Create a new invalid cron error
    pub fn invalid_cron(expr: &str, reason: impl Into<String>) -> Self {
        Error::InvalidCron {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
