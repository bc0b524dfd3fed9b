//! Task execution and dispatch entry point.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use serde::Serialize;

use crate::bulb::Delivery;
use crate::device::{Action, Device, DeviceRegistry};
use crate::dispatch::{AsyncTask, Backend, DispatchHandle, Dispatcher};
use crate::errors::Error;
use crate::ramp::RampReport;
use crate::sunlight::AmbientSource;
use crate::types::PowerState;
use crate::wol::WakeReport;

type Result<T> = std::result::Result<T, Error>;

/// What running a task produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// One packet per bulb
    Delivered { sent: usize, failed: usize },
    Ramp(RampReport),
    Wake { attempts: usize, failures: usize },
    /// A remote command completed
    Completed,
}

impl TaskOutcome {
    fn deliveries(deliveries: &[Delivery]) -> Self {
        let sent = deliveries.iter().filter(|d| d.is_sent()).count();
        TaskOutcome::Delivered {
            sent,
            failed: deliveries.len() - sent,
        }
    }

    fn wake(report: WakeReport) -> Self {
        TaskOutcome::Wake {
            attempts: report.attempts,
            failures: report.failures,
        }
    }
}

/// Runs tasks inline against the device registry.
///
/// This is what a queue worker or a launched `exec` process calls.
pub struct Executor {
    registry: DeviceRegistry,
    ambient: Option<Arc<dyn AmbientSource>>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("registry", &self.registry)
            .field("ambient", &self.ambient.is_some())
            .finish()
    }
}

impl Executor {
    pub fn new(registry: DeviceRegistry) -> Self {
        Executor {
            registry,
            ambient: None,
        }
    }

    pub fn with_ambient(mut self, ambient: Arc<dyn AmbientSource>) -> Self {
        self.ambient = Some(ambient);
        self
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn has_ambient(&self) -> bool {
        self.ambient.is_some()
    }

    fn ambient(&self) -> Result<&dyn AmbientSource> {
        self.ambient.as_deref().ok_or(Error::MissingLocation)
    }

    /// Look up the task's device and run its action.
    pub async fn execute(&self, task: &AsyncTask) -> Result<TaskOutcome> {
        info!(
            "Running {} on {} ({})",
            task.action.method(),
            task.device,
            serde_json::to_string(&task.action).unwrap_or_default()
        );
        let device = self.registry.get(&task.device)?;
        self.run(device, &task.action).await
    }

    /// Run `action` on `device` now.
    pub async fn run(&self, device: &Device, action: &Action) -> Result<TaskOutcome> {
        device.validate(action)?;
        match (device, action) {
            (Device::Bulb(bulb), Action::ChangeColor(command)) => {
                let delivery = bulb.change_color(command).await?;
                Ok(TaskOutcome::deliveries(&[delivery]))
            }
            (Device::Room(room), Action::ChangeColor(command)) => {
                let deliveries = room.change_color(command).await?;
                Ok(TaskOutcome::deliveries(&deliveries))
            }
            (
                Device::Bulb(bulb),
                Action::Fade {
                    start,
                    stop,
                    step,
                    header,
                },
            ) => bulb
                .fade(start.as_ref(), stop.as_ref(), *step, *header)
                .await
                .map(TaskOutcome::Ramp),
            (
                Device::Room(room),
                Action::Fade {
                    start,
                    stop,
                    step,
                    header,
                },
            ) => room
                .fade(start.as_ref(), stop.as_ref(), *step, *header)
                .await
                .map(TaskOutcome::Ramp),
            (Device::Bulb(bulb), Action::Sunlight) => {
                let delivery = bulb.sunlight(self.ambient()?).await?;
                Ok(TaskOutcome::deliveries(&[delivery]))
            }
            (Device::Room(room), Action::Sunlight) => {
                let deliveries = room.sunlight(self.ambient()?).await?;
                Ok(TaskOutcome::deliveries(&deliveries))
            }
            (Device::Bulb(bulb), Action::FadeSunlight { step, header }) => bulb
                .fade_sunlight(self.ambient()?, *step, *header)
                .await
                .map(TaskOutcome::Ramp),
            (Device::Room(room), Action::FadeSunlight { step, header }) => room
                .fade_sunlight(self.ambient()?, *step, *header)
                .await
                .map(TaskOutcome::Ramp),
            (Device::Computer(computer), Action::Wake)
            | (
                Device::Computer(computer),
                Action::Power {
                    state: PowerState::On,
                },
            ) => Ok(TaskOutcome::wake(computer.wake().await)),
            (Device::Computer(computer), Action::Power { state }) => {
                computer.power(*state).await.map(|_| TaskOutcome::Completed)
            }
            (Device::Computer(computer), Action::Sleep) => {
                computer.sleep().await.map(|_| TaskOutcome::Completed)
            }
            (Device::Computer(computer), Action::Restart) => {
                computer.restart().await.map(|_| TaskOutcome::Completed)
            }
            (Device::Computer(computer), Action::RebootTo { boot_option }) => computer
                .reboot_to(*boot_option)
                .await
                .map(|_| TaskOutcome::Completed),
            (Device::Computer(computer), Action::StartVm { name }) => {
                computer.start_vm(name).await.map(|_| TaskOutcome::Completed)
            }
            (Device::Computer(computer), Action::StopVm { name }) => {
                computer.stop_vm(name).await.map(|_| TaskOutcome::Completed)
            }
            (Device::WakeOnLan(target), Action::Wake | Action::Power { .. }) => {
                Ok(TaskOutcome::wake(target.wake().await))
            }
            (device, action) => Err(Error::unsupported_action(device.kind(), action.method())),
        }
    }
}

/// Validates device actions and hands them to the configured dispatcher.
///
/// Nothing here performs device I/O; a successful [`Hub::dispatch`] only
/// means the task was accepted by the backend.
#[derive(Debug, Clone)]
pub struct Hub {
    executor: Arc<Executor>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Hub {
    pub fn new(executor: Arc<Executor>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Hub {
            executor,
            dispatcher,
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn registry(&self) -> &DeviceRegistry {
        self.executor.registry()
    }

    pub fn backend(&self) -> Backend {
        self.dispatcher.backend()
    }

    /// Run `action` on `device` after `delay`, off the calling thread.
    ///
    /// Unknown devices, unsupported actions and invalid arguments fail here,
    /// before the task is dispatched.
    pub fn dispatch(&self, device: &str, action: Action, delay: Duration) -> Result<DispatchHandle> {
        self.registry().get(device)?.validate(&action)?;
        if action.needs_ambient() && !self.executor.has_ambient() {
            return Err(Error::MissingLocation);
        }
        self.dispatcher.dispatch(AsyncTask::new(device, action, delay))
    }

    /// Let the dispatcher flush tasks held in this process.
    pub fn shutdown(&self) {
        self.dispatcher.shutdown();
    }
}
