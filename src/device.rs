//! Devices known to the hub and the actions they accept.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;

use crate::bulb::Bulb;
use crate::command::ColorCommand;
use crate::computer::Computer;
use crate::endpoint::Endpoint;
use crate::errors::Error;
use crate::packet::encode;
use crate::ramp::RampHeader;
use crate::room::Room;
use crate::types::PowerState;
use crate::wol::WakeOnLan;

type Result<T> = std::result::Result<T, Error>;

fn default_step() -> u8 {
    5
}

/// A device command that can be serialized into a task.
///
/// Serialized as `{"method": "...", "params": {...}}`.
///
/// # Example
///
/// ```
/// use home_hub_rs::{Action, PowerState};
///
/// let action: Action =
///     serde_json::from_str(r#"{"method": "power", "params": {"state": "suspend"}}"#).unwrap();
/// assert_eq!(action, Action::Power { state: PowerState::Sleep });
/// assert_eq!(action.method(), "power");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    ChangeColor(ColorCommand),
    Fade {
        #[serde(default)]
        start: Option<ColorCommand>,
        #[serde(default)]
        stop: Option<ColorCommand>,
        #[serde(default = "default_step")]
        step: u8,
        #[serde(default)]
        header: RampHeader,
    },
    Sunlight,
    FadeSunlight {
        #[serde(default = "default_step")]
        step: u8,
        #[serde(default)]
        header: RampHeader,
    },
    Wake,
    Power {
        state: PowerState,
    },
    Sleep,
    Restart,
    RebootTo {
        boot_option: u32,
    },
    StartVm {
        name: String,
    },
    StopVm {
        name: String,
    },
}

impl Action {
    /// Name of the action as it appears on the wire.
    pub fn method(&self) -> &'static str {
        self.into()
    }

    /// Whether the action runs against the ambient light model.
    pub fn needs_ambient(&self) -> bool {
        matches!(self, Action::Sunlight | Action::FadeSunlight { .. })
    }

    /// Check the action's own arguments without touching the network.
    pub fn validate(&self) -> Result<()> {
        match self {
            Action::ChangeColor(command) => encode(command).map(|_| ()),
            Action::Fade {
                start,
                stop,
                step,
                header,
            } => {
                if *step == 0 {
                    return Err(Error::InvalidStep);
                }
                for command in start.iter().chain(stop.iter()) {
                    encode(&command.clone().with_mode((*header).into()))?;
                }
                Ok(())
            }
            Action::FadeSunlight { step: 0, .. } => Err(Error::InvalidStep),
            _ => Ok(()),
        }
    }
}

/// Every kind of device the hub can drive.
#[derive(Debug, Clone, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Device {
    Bulb(Bulb),
    Room(Room),
    Computer(Computer),
    WakeOnLan(WakeOnLan),
}

impl Device {
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    pub fn supports(&self, action: &Action) -> bool {
        match self {
            Device::Bulb(_) | Device::Room(_) => matches!(
                action,
                Action::ChangeColor(_)
                    | Action::Fade { .. }
                    | Action::Sunlight
                    | Action::FadeSunlight { .. }
            ),
            Device::Computer(_) => matches!(
                action,
                Action::Wake
                    | Action::Power { .. }
                    | Action::Sleep
                    | Action::Restart
                    | Action::RebootTo { .. }
                    | Action::StartVm { .. }
                    | Action::StopVm { .. }
            ),
            Device::WakeOnLan(_) => matches!(
                action,
                Action::Wake
                    | Action::Power {
                        state: PowerState::On
                    }
            ),
        }
    }

    /// Reject actions this device cannot run, and invalid arguments, before any I/O.
    pub fn validate(&self, action: &Action) -> Result<()> {
        if !self.supports(action) {
            return Err(Error::unsupported_action(self.kind(), action.method()));
        }
        action.validate()
    }

    /// Network endpoint of a single-endpoint device. Rooms have none.
    pub fn endpoint(&self) -> Option<Endpoint> {
        match self {
            Device::Bulb(bulb) => Some(bulb.endpoint()),
            Device::Room(_) => None,
            Device::Computer(computer) => Some(computer.endpoint()),
            Device::WakeOnLan(target) => Some(target.endpoint()),
        }
    }
}

/// Devices by id, loaded once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a device.
    pub fn insert(&mut self, id: &str, device: Device) -> Option<Device> {
        self.devices.insert(id.to_string(), device)
    }

    pub fn get(&self, id: &str) -> Result<&Device> {
        self.devices
            .get(id)
            .ok_or_else(|| Error::DeviceNotFound(id.to_string()))
    }

    /// Endpoint of the device `id`.
    pub fn endpoint(&self, id: &str) -> Result<Endpoint> {
        let device = self.get(id)?;
        device
            .endpoint()
            .ok_or_else(|| Error::unsupported_action(device.kind(), "endpoint"))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Device)> {
        self.devices.iter().map(|(id, device)| (id.as_str(), device))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl FromIterator<(String, Device)> for DeviceRegistry {
    fn from_iter<I: IntoIterator<Item = (String, Device)>>(iter: I) -> Self {
        DeviceRegistry {
            devices: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, Mode, Speed};
    use crate::wol::MacAddress;

    fn registry() -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        registry.insert("lamp", Device::Bulb(Bulb::new("10.0.0.2")));
        registry.insert(
            "desktop",
            Device::Computer(Computer::new("10.0.0.5", MacAddress::new([1, 2, 3, 4, 5, 6]))),
        );
        registry.insert("living", Device::Room(Room::new("Living Room")));
        registry
    }

    #[test]
    fn test_action_wire_format() {
        let action = Action::Fade {
            start: None,
            stop: Some(ColorCommand::white(200)),
            step: 10,
            header: RampHeader::Camera,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["method"], "fade");
        assert_eq!(json["params"]["step"], 10);
        assert_eq!(json["params"]["header"], "camera");
        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);

        let wake: Action = serde_json::from_str(r#"{"method": "wake"}"#).unwrap();
        assert_eq!(wake, Action::Wake);
    }

    #[test]
    fn test_device_tagging() {
        let device: Device =
            serde_json::from_str(r#"{"kind": "bulb", "host": "10.0.0.9"}"#).unwrap();
        assert_eq!(device.kind(), "bulb");
        assert_eq!(device.endpoint(), Some(Endpoint::bulb("10.0.0.9")));

        let target: Device =
            serde_json::from_str(r#"{"kind": "wake_on_lan", "mac": "aa:bb:cc:dd:ee:ff"}"#).unwrap();
        assert_eq!(target.kind(), "wake_on_lan");
    }

    #[test]
    fn test_room_device_checks_endpoints() {
        let room: Device = serde_json::from_str(
            r#"{"kind": "room", "name": "Hall", "bulbs": [{"host": "10.0.0.2"}, {"host": "10.0.0.3"}]}"#,
        )
        .unwrap();
        assert_eq!(room.kind(), "room");

        let duplicate = serde_json::from_str::<Device>(
            r#"{"kind": "room", "name": "Hall", "bulbs": [{"host": "10.0.0.2"}, {"host": "10.0.0.2"}]}"#,
        );
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_validate_rejects_unsupported() {
        let registry = registry();
        let lamp = registry.get("lamp").unwrap();
        assert_eq!(
            lamp.validate(&Action::Wake),
            Err(Error::unsupported_action("bulb", "wake"))
        );
        let desktop = registry.get("desktop").unwrap();
        assert!(desktop.validate(&Action::Restart).is_ok());
        assert!(desktop.validate(&Action::Sunlight).is_err());
    }

    #[test]
    fn test_validate_checks_arguments() {
        let lamp = Device::Bulb(Bulb::new("10.0.0.2"));
        let bad = ColorCommand::raw(Color::new(), 255, Mode::Function, Some(40), Speed::new());
        assert_eq!(
            lamp.validate(&Action::ChangeColor(bad)),
            Err(Error::UnsupportedFunction(40))
        );
        assert_eq!(
            lamp.validate(&Action::FadeSunlight {
                step: 0,
                header: RampHeader::Color
            }),
            Err(Error::InvalidStep)
        );
    }

    #[test]
    fn test_registry_lookup() {
        let registry = registry();
        assert_eq!(registry.endpoint("desktop").unwrap(), Endpoint::ssh("10.0.0.5"));
        assert_eq!(
            registry.endpoint("missing"),
            Err(Error::DeviceNotFound("missing".to_string()))
        );
        assert!(registry.endpoint("living").is_err());
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["desktop", "lamp", "living"]);
    }
}
