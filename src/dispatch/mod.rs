//! Deferred execution of device actions.
//!
//! A [`Dispatcher`] accepts an [`AsyncTask`] and returns immediately. Where
//! and when the task runs depends on the backend chosen once at startup:
//!
//! - [`QueueDispatcher`] writes the task to a durable [`Broker`] and a
//!   [`Worker`] process runs it once its ETA has passed.
//! - [`LocalDispatcher`] launches a new process per task, holding delayed
//!   tasks in an in-process delay queue until they are due.
//!
//! Neither backend reports results back to the dispatching caller and a
//! dispatched task cannot be cancelled.

mod local;
mod queue;
mod worker;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DurationSecondsWithFrac, serde_as};
use strum_macros::Display;
use uuid::Uuid;

use crate::device::Action;
use crate::errors::Error;

pub use local::{Launcher, LocalDispatcher, ProcessLauncher};
pub use queue::{Broker, QueueDispatcher, SpoolBroker};
pub use worker::Worker;

type Result<T> = std::result::Result<T, Error>;

/// Dispatcher backend, selected once per process.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Backend {
    Queue,
    #[default]
    Local,
}

/// A device action waiting to run.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use home_hub_rs::{Action, dispatch::AsyncTask};
///
/// let task = AsyncTask::new("desktop", Action::Wake, Duration::from_millis(1500));
/// let json = task.to_json().unwrap();
/// assert!(json.contains(r#""delay":1.5"#));
/// assert_eq!(AsyncTask::from_json(&json).unwrap(), task);
/// ```
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncTask {
    pub id: Uuid,
    pub device: String,
    pub action: Action,
    /// Delay before execution, in seconds on the wire.
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default)]
    pub delay: Duration,
}

impl AsyncTask {
    pub fn new(device: &str, action: Action, delay: Duration) -> Self {
        AsyncTask {
            id: Uuid::new_v4(),
            device: device.to_string(),
            action,
            delay,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::JsonDump)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::JsonLoad)
    }

    /// Wall-clock time at which the task becomes due, counted from `now`.
    pub fn eta_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let delay = chrono::Duration::from_std(self.delay)
            .map_err(|e| Error::dispatch("delay out of range", e))?;
        now.checked_add_signed(delay)
            .ok_or_else(|| Error::Dispatch(format!("delay {:?} out of range", self.delay)))
    }
}

impl fmt::Display for AsyncTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} on {}", self.id, self.action.method(), self.device)
    }
}

/// Receipt for a dispatched task. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchHandle {
    pub id: Uuid,
    pub backend: Backend,
    pub eta: DateTime<Utc>,
}

/// Hands tasks to an execution backend without waiting for them to run.
pub trait Dispatcher: Send + Sync + fmt::Debug {
    fn backend(&self) -> Backend;

    /// Accept `task` for execution after its delay.
    ///
    /// Errors mean the task was not accepted; success says nothing about
    /// whether it will run successfully.
    fn dispatch(&self, task: AsyncTask) -> Result<DispatchHandle>;

    /// Flush work held in this process before it exits.
    fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!(Backend::Queue.to_string(), "queue");
        let backend: Backend = serde_json::from_str("\"local\"").unwrap();
        assert_eq!(backend, Backend::Local);
        assert_eq!(Backend::default(), Backend::Local);
    }

    #[test]
    fn test_task_without_delay_field() {
        let json = r#"{"id": "67e55044-10b1-426f-9247-bb680e5fe0c8", "device": "lamp",
                       "action": {"method": "sunlight"}}"#;
        let task = AsyncTask::from_json(json).unwrap();
        assert_eq!(task.delay, Duration::ZERO);
        assert_eq!(task.action, Action::Sunlight);
    }

    #[test]
    fn test_eta_from() {
        let task = AsyncTask::new("lamp", Action::Sunlight, Duration::from_secs(90));
        let now = Utc::now();
        assert_eq!(task.eta_from(now).unwrap() - now, chrono::Duration::seconds(90));
    }

    #[test]
    fn test_eta_out_of_range() {
        let now = Utc::now();
        for delay in [Duration::from_secs(1_000_000_000_000_000), Duration::MAX] {
            let task = AsyncTask::new("lamp", Action::Sunlight, delay);
            assert!(matches!(task.eta_from(now), Err(Error::Dispatch(_))));
        }
    }
}
