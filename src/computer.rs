//! Power and wake control of desktop computers.
//!
//! Waking goes through [`crate::wol`]; every other transition is a command run
//! over a remote shell.

use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::endpoint::{Endpoint, default_ssh_port};
use crate::errors::Error;
use crate::remote::{self, OpenSsh, RemoteShell, SshLogin, VirtualMachine, shell_quote};
use crate::types::PowerState;
use crate::wol::{MacAddress, WakeMethod, WakeOnLan, WakeReport};

type Result<T> = std::result::Result<T, Error>;

/// Operating system family, which decides the suspend command.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OsFamily {
    /// systemd based
    #[default]
    Linux,
    /// pm-utils based
    LinuxOld,
}

impl OsFamily {
    pub fn suspend_command(&self) -> &'static str {
        match self {
            OsFamily::Linux => "sudo systemctl suspend",
            OsFamily::LinuxOld => "pm-suspend",
        }
    }
}

/// A computer reachable over SSH and wakeable over the LAN.
///
/// # Example
///
/// ```
/// use home_hub_rs::Computer;
///
/// let computer: Computer = serde_json::from_str(
///     r#"{"host": "10.0.0.5", "mac": "aa:bb:cc:dd:ee:ff", "wake_method": "ether-wake"}"#,
/// )
/// .unwrap();
/// assert_eq!(computer.endpoint().port, 22);
/// ```
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Computer {
    host: String,
    #[serde(default = "default_ssh_port")]
    port: u16,
    mac: MacAddress,
    /// Where native magic packets are sent; the limited broadcast address if unset.
    broadcast: Option<String>,
    #[serde(alias = "manual_interface")]
    interface: Option<String>,
    #[serde(default)]
    os: OsFamily,
    #[serde(default, alias = "wakeonlan")]
    wake_method: WakeMethod,
    #[serde(default = "default_username")]
    username: String,
    keyfile: Option<String>,
    password: Option<String>,
    #[serde(skip, default = "default_shell")]
    shell: Arc<dyn RemoteShell>,
}

fn default_username() -> String {
    "root".to_string()
}

fn default_shell() -> Arc<dyn RemoteShell> {
    Arc::new(OpenSsh::default())
}

impl Computer {
    pub fn new(host: &str, mac: MacAddress) -> Self {
        Computer {
            host: host.to_string(),
            port: Endpoint::SSH_PORT,
            mac,
            broadcast: None,
            interface: None,
            os: OsFamily::default(),
            wake_method: WakeMethod::default(),
            username: default_username(),
            keyfile: None,
            password: None,
            shell: default_shell(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_os(mut self, os: OsFamily) -> Self {
        self.os = os;
        self
    }

    pub fn with_wake_method(mut self, method: WakeMethod) -> Self {
        self.wake_method = method;
        self
    }

    /// Send native magic packets to `broadcast` instead of 255.255.255.255.
    pub fn with_broadcast(mut self, broadcast: &str) -> Self {
        self.broadcast = Some(broadcast.to_string());
        self
    }

    pub fn with_interface(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_string());
        self
    }

    pub fn with_credentials(mut self, username: &str, keyfile: Option<&str>, password: Option<&str>) -> Self {
        self.username = username.to_string();
        self.keyfile = keyfile.map(str::to_string);
        self.password = password.map(str::to_string);
        self
    }

    /// Replace the remote shell, e.g. with a recording fake in tests.
    pub fn with_shell(mut self, shell: Arc<dyn RemoteShell>) -> Self {
        self.shell = shell;
        self
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(&self.host, self.port)
    }

    pub fn mac(&self) -> &MacAddress {
        &self.mac
    }

    pub fn os(&self) -> OsFamily {
        self.os
    }

    fn login(&self) -> SshLogin {
        SshLogin {
            endpoint: self.endpoint(),
            username: self.username.clone(),
            keyfile: self.keyfile.clone(),
            password: self.password.clone(),
        }
    }

    fn wake_target(&self) -> WakeOnLan {
        let mut target = WakeOnLan::new(self.mac).with_method(self.wake_method);
        if let Some(broadcast) = &self.broadcast {
            target = target.with_host(broadcast);
        }
        if let Some(interface) = &self.interface {
            target = target.with_interface(interface);
        }
        target
    }

    /// Run a command on the computer and return its output.
    pub async fn run_command(&self, command: &str) -> Result<String> {
        remote::run_remote(self.shell.clone(), self.login(), command.to_string()).await
    }

    /// Send the wake signal five times; never fails.
    pub async fn wake(&self) -> WakeReport {
        self.wake_target().wake().await
    }

    pub async fn sleep(&self) -> Result<()> {
        self.run_command(self.os.suspend_command()).await.map(|_| ())
    }

    pub async fn restart(&self) -> Result<()> {
        self.run_command("sudo reboot").await.map(|_| ())
    }

    /// Move the computer to `state`.
    ///
    /// `On` wakes the machine and cannot fail; the other states run a remote
    /// command whose connection or authentication failure is returned.
    pub async fn power(&self, state: PowerState) -> Result<()> {
        info!("Setting {} to {}", self.endpoint(), state);
        match state {
            PowerState::On => {
                self.wake().await;
                Ok(())
            }
            PowerState::Off => self.run_command("sudo poweroff").await.map(|_| ()),
            PowerState::Sleep => self.sleep().await,
            PowerState::Restart => self.restart().await,
        }
    }

    /// Select a GRUB entry for the next boot only, then restart.
    pub async fn reboot_to(&self, boot_option: u32) -> Result<()> {
        self.run_command(&format!("sudo grub-reboot {boot_option}")).await?;
        self.run_command(&format!("sudo grub2-reboot {boot_option}")).await?;
        self.restart().await
    }

    pub async fn list_vms(&self) -> Result<Vec<VirtualMachine>> {
        let output = self.run_command("virsh list --all").await?;
        Ok(remote::parse_vm_table(&output))
    }

    pub async fn start_vm(&self, name: &str) -> Result<()> {
        self.run_command(&format!("virsh start {}", shell_quote(name)))
            .await
            .map(|_| ())
    }

    pub async fn stop_vm(&self, name: &str) -> Result<()> {
        self.run_command(&format!("virsh shutdown {}", shell_quote(name)))
            .await
            .map(|_| ())
    }
}

/// Parse `state` and move `computer` to it.
///
/// Accepts `on`, `off`, `sleep`, `suspend`, `restart` and `reboot`; anything
/// else fails with [`Error::UnsupportedState`] before any I/O.
pub async fn set_power(computer: &Computer, state: &str) -> Result<()> {
    let state: PowerState = state.parse()?;
    computer.power(state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suspend_commands() {
        assert_eq!(OsFamily::Linux.suspend_command(), "sudo systemctl suspend");
        assert_eq!(OsFamily::LinuxOld.suspend_command(), "pm-suspend");
    }

    #[test]
    fn test_deserialize_defaults() {
        let computer: Computer =
            serde_json::from_str(r#"{"host": "pc", "mac": "00:11:22:33:44:55", "os": "linux-old"}"#)
                .unwrap();
        assert_eq!(computer.endpoint(), Endpoint::new("pc", 22));
        assert_eq!(computer.os(), OsFamily::LinuxOld);
        assert_eq!(computer.wake_target().method(), WakeMethod::Native);
        assert_eq!(computer.login().username, "root");
    }

    #[test]
    fn test_wake_target_uses_interface() {
        let computer = Computer::new("pc", MacAddress::new([0; 6]))
            .with_wake_method(WakeMethod::EtherWake)
            .with_interface("eth1");
        assert_eq!(computer.wake_target().method(), WakeMethod::EtherWake);
    }
}
