//! Remote shell sessions for computer power control.
//!
//! Commands go through the system OpenSSH client. A session is opened per
//! command; connection and authentication failures are returned to the caller
//! and never retried.

use std::fmt;
use std::process::Command;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;
use crate::errors::Error;
use crate::runtime;

type Result<T> = std::result::Result<T, Error>;

/// ssh exits with 255 when it could not connect or authenticate.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Credentials and address for one remote session.
#[derive(Clone, PartialEq, Eq)]
pub struct SshLogin {
    pub endpoint: Endpoint,
    pub username: String,
    pub keyfile: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for SshLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshLogin")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("keyfile", &self.keyfile)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Runs a command on a remote host and returns its standard output.
///
/// Implementations block; async callers go through [`run_remote`].
pub trait RemoteShell: Send + Sync + fmt::Debug {
    fn run(&self, login: &SshLogin, command: &str) -> Result<String>;
}

/// [`RemoteShell`] backed by the `ssh` binary.
///
/// Key-based by default. When a password is configured the client is wrapped
/// in `sshpass -e` and the password is passed through the environment.
#[derive(Debug, Clone)]
pub struct OpenSsh {
    program: String,
}

impl Default for OpenSsh {
    fn default() -> Self {
        OpenSsh {
            program: "ssh".to_string(),
        }
    }
}

impl OpenSsh {
    pub fn with_program(program: &str) -> Self {
        OpenSsh {
            program: program.to_string(),
        }
    }

    /// Build the process invocation without running it.
    pub fn command(&self, login: &SshLogin, command: &str) -> Command {
        let mut cmd = match &login.password {
            Some(password) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg(&self.program).env("SSHPASS", password);
                cmd
            }
            None => {
                let mut cmd = Command::new(&self.program);
                cmd.args(["-o", "BatchMode=yes"]);
                cmd
            }
        };
        cmd.args(["-o", "StrictHostKeyChecking=accept-new"])
            .arg("-p")
            .arg(login.endpoint.port.to_string());
        if let Some(keyfile) = &login.keyfile {
            cmd.arg("-i").arg(keyfile);
        }
        cmd.arg(format!("{}@{}", login.username, login.endpoint.host))
            .arg(command);
        cmd
    }
}

impl RemoteShell for OpenSsh {
    fn run(&self, login: &SshLogin, command: &str) -> Result<String> {
        let host = login.endpoint.to_string();
        debug!("Running {:?} on {}", command, host);
        let output = self
            .command(login, command)
            .output()
            .map_err(|e| Error::remote(&host, command, e.to_string()))?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
            Some(SSH_CONNECTION_FAILURE) => Err(Error::remote(
                &host,
                command,
                format!("connection failed: {stderr}"),
            )),
            _ => Err(Error::remote(
                &host,
                command,
                format!("exited with {}: {stderr}", output.status),
            )),
        }
    }
}

/// Run `command` on a blocking thread.
pub async fn run_remote(
    shell: Arc<dyn RemoteShell>,
    login: SshLogin,
    command: String,
) -> Result<String> {
    runtime::spawn_blocking(move || shell.run(&login, &command)).await
}

/// Quote a value for a POSIX shell.
///
/// # Examples
///
/// ```
/// use home_hub_rs::remote::shell_quote;
///
/// assert_eq!(shell_quote("win10"), "'win10'");
/// assert_eq!(shell_quote("it's"), r"'it'\''s'");
/// ```
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// A guest reported by the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub name: String,
    pub status: String,
}

/// Parse the table printed by `virsh list --all`.
///
/// Header, separator and blank lines are skipped; the status may contain
/// spaces ("shut off").
pub fn parse_vm_table(output: &str) -> Vec<VirtualMachine> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.chars().all(|c| c == '-'))
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let id = columns.next()?;
            if id.eq_ignore_ascii_case("id") {
                return None;
            }
            let name = columns.next()?;
            let status = columns.collect::<Vec<_>>().join(" ");
            if status.is_empty() {
                return None;
            }
            Some(VirtualMachine {
                name: name.to_string(),
                status,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(password: Option<&str>) -> SshLogin {
        SshLogin {
            endpoint: Endpoint::ssh("10.0.0.5"),
            username: "root".to_string(),
            keyfile: Some("/keys/id_ed25519".to_string()),
            password: password.map(str::to_string),
        }
    }

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_key_based_command() {
        let cmd = OpenSsh::default().command(&login(None), "sudo poweroff");
        assert_eq!(cmd.get_program(), "ssh");
        let args = args(&cmd);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.windows(2).any(|w| w == ["-p", "22"]));
        assert!(args.windows(2).any(|w| w == ["-i", "/keys/id_ed25519"]));
        assert_eq!(&args[args.len() - 2..], ["root@10.0.0.5", "sudo poweroff"]);
    }

    #[test]
    fn test_password_uses_sshpass() {
        let cmd = OpenSsh::default().command(&login(Some("hunter2")), "uptime");
        assert_eq!(cmd.get_program(), "sshpass");
        let args = args(&cmd);
        assert_eq!(&args[..2], ["-e", "ssh"]);
        assert!(!args.contains(&"BatchMode=yes".to_string()));
        assert!(cmd.get_envs().any(|(k, v)| k == "SSHPASS" && v.is_some()));
    }

    #[test]
    fn test_password_not_in_debug() {
        let debug = format!("{:?}", login(Some("hunter2")));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_parse_vm_table() {
        let output = " Id   Name        State\n\
                      ------------------------------\n \
                      1    ubuntu      running\n \
                      -    win10       shut off\n\n";
        let vms = parse_vm_table(output);
        assert_eq!(
            vms,
            vec![
                VirtualMachine {
                    name: "ubuntu".to_string(),
                    status: "running".to_string()
                },
                VirtualMachine {
                    name: "win10".to_string(),
                    status: "shut off".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_empty_table() {
        assert!(parse_vm_table(" Id   Name   State\n-----------\n\n").is_empty());
    }
}
