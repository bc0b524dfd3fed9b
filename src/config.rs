//! Hub configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationSecondsWithFrac, serde_as};

use crate::device::{Action, DeviceRegistry};
use crate::dispatch::{
    Backend, Dispatcher, LocalDispatcher, ProcessLauncher, QueueDispatcher, SpoolBroker, Worker,
};
use crate::errors::Error;
use crate::hub::{Executor, Hub};
use crate::scheduler::{ScheduledJob, Scheduler, Trigger};
use crate::sunlight::{Location, Sunlight};

type Result<T> = std::result::Result<T, Error>;

fn default_spool_dir() -> PathBuf {
    PathBuf::from("/var/spool/home-hub")
}

fn default_concurrency() -> usize {
    Worker::DEFAULT_CONCURRENCY
}

/// Settings of the durable queue backend.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QueueConfig {
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,
    /// Tasks a worker runs at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            spool_dir: default_spool_dir(),
            concurrency: default_concurrency(),
        }
    }
}

/// Settings of the local process backend.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct LocalConfig {
    /// Executable launched per task; the running executable if unset.
    pub program: Option<PathBuf>,
}

/// A job registered with the scheduler at startup.
#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JobConfig {
    pub id: String,
    pub trigger: Trigger,
    pub device: String,
    pub action: Action,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default)]
    pub delay: Duration,
}

/// Everything the hub reads at startup.
///
/// # Example
///
/// ```
/// use home_hub_rs::{HubConfig, dispatch::Backend};
///
/// let config = HubConfig::from_json(r#"{
///     "backend": "queue",
///     "queue": {"spool_dir": "/tmp/hub-spool"},
///     "location": {"latitude": 51.5, "longitude": -0.12},
///     "devices": {
///         "lamp": {"kind": "bulb", "host": "192.168.1.40"}
///     },
///     "jobs": [{
///         "id": "evening",
///         "trigger": {"type": "cron", "expr": "0 18 * * *"},
///         "device": "lamp",
///         "action": {"method": "fade_sunlight", "params": {"step": 5}}
///     }]
/// }"#).unwrap();
/// assert_eq!(config.backend, Backend::Queue);
/// assert_eq!(config.devices.len(), 1);
/// ```
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct HubConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub local: LocalConfig,
    pub location: Option<Location>,
    #[serde(default)]
    pub devices: DeviceRegistry,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

impl HubConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::JsonLoad)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::JsonDump)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|err| Error::ConfigRead {
            path: path.to_path_buf(),
            err,
        })?;
        Self::from_json(&json)
    }

    /// Executor over the configured devices, with sunlight if a location is set.
    pub fn executor(&self) -> Executor {
        let executor = Executor::new(self.devices.clone());
        match self.location {
            Some(location) => executor.with_ambient(Arc::new(Sunlight::new(location))),
            None => executor,
        }
    }

    pub fn broker(&self) -> Result<SpoolBroker> {
        SpoolBroker::open(&self.queue.spool_dir)
    }

    /// The configured dispatcher.
    ///
    /// `config_path` is forwarded to launched task processes so they load
    /// the same devices.
    pub fn dispatcher(&self, config_path: Option<&Path>) -> Result<Arc<dyn Dispatcher>> {
        Ok(match self.backend {
            Backend::Queue => Arc::new(QueueDispatcher::new(Arc::new(self.broker()?))),
            Backend::Local => {
                let launcher = match &self.local.program {
                    Some(program) => ProcessLauncher::new(program, config_path),
                    None => ProcessLauncher::current_exe(config_path)?,
                };
                Arc::new(LocalDispatcher::new(Arc::new(launcher)))
            }
        })
    }

    pub fn hub(&self, config_path: Option<&Path>) -> Result<Hub> {
        Ok(Hub::new(
            Arc::new(self.executor()),
            self.dispatcher(config_path)?,
        ))
    }

    pub fn worker(&self) -> Result<Worker> {
        Ok(Worker::new(Arc::new(self.broker()?), Arc::new(self.executor()))
            .with_concurrency(self.queue.concurrency))
    }

    /// Register every configured job with `scheduler`, dispatching through `hub`.
    pub fn schedule_jobs(&self, scheduler: &Scheduler, hub: &Arc<Hub>) -> Result<()> {
        for job in &self.jobs {
            hub.registry().get(&job.device)?.validate(&job.action)?;
            scheduler.add_job(ScheduledJob::dispatch(
                &job.id,
                job.trigger.clone(),
                Arc::clone(hub),
                &job.device,
                job.action.clone(),
                job.delay,
            ))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HubConfig::from_json("{}").unwrap();
        assert_eq!(config.backend, Backend::Local);
        assert_eq!(config.queue, QueueConfig::default());
        assert!(config.location.is_none());
        assert!(config.devices.is_empty());
        assert!(!config.executor().has_ambient());
    }

    #[test]
    fn test_job_config() {
        let job: JobConfig = serde_json::from_str(
            r#"{"id": "wake", "trigger": {"type": "interval", "seconds": 60},
                "device": "desktop", "action": {"method": "wake"}, "delay": 2.5}"#,
        )
        .unwrap();
        assert_eq!(job.delay, Duration::from_millis(2500));
        assert_eq!(job.action, Action::Wake);
    }

    #[test]
    fn test_missing_file() {
        let err = HubConfig::load(Path::new("/nonexistent/hub.json")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[test]
    fn test_bad_device_kind() {
        let err = HubConfig::from_json(r#"{"devices": {"x": {"kind": "toaster"}}}"#).unwrap_err();
        assert!(matches!(err, Error::JsonLoad(_)));
    }
}
