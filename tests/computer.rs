use std::sync::{Arc, Mutex};

use home_hub_rs::remote::{RemoteShell, SshLogin};
use home_hub_rs::runtime::block_on;
use home_hub_rs::{
    Action, Computer, Device, DeviceRegistry, Error, Executor, MacAddress, OsFamily, PowerState,
    TaskOutcome, set_power,
};

#[derive(Debug, Default)]
struct FakeShell {
    output: String,
    unreachable: bool,
    commands: Mutex<Vec<(String, String)>>,
}

impl FakeShell {
    fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(_, command)| command.clone())
            .collect()
    }
}

impl RemoteShell for FakeShell {
    fn run(&self, login: &SshLogin, command: &str) -> Result<String, Error> {
        if self.unreachable {
            return Err(Error::remote(&login.endpoint.host, command, "connection refused"));
        }
        self.commands
            .lock()
            .unwrap()
            .push((login.endpoint.address(), command.to_string()));
        Ok(self.output.clone())
    }
}

fn computer(shell: &Arc<FakeShell>) -> Computer {
    Computer::new("10.0.0.5", MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]))
        .with_broadcast("127.0.0.1")
        .with_shell(shell.clone())
}

#[test]
fn test_power_transitions_run_remote_commands() {
    let shell = Arc::new(FakeShell::default());
    let pc = computer(&shell);

    block_on(pc.power(PowerState::Off)).unwrap();
    block_on(pc.power(PowerState::Sleep)).unwrap();
    block_on(pc.power(PowerState::Restart)).unwrap();
    block_on(pc.clone().with_os(OsFamily::LinuxOld).sleep()).unwrap();

    assert_eq!(
        shell.commands(),
        vec!["sudo poweroff", "sudo systemctl suspend", "sudo reboot", "pm-suspend"]
    );
    let hosts: Vec<String> = shell
        .commands
        .lock()
        .unwrap()
        .iter()
        .map(|(host, _)| host.clone())
        .collect();
    assert!(hosts.iter().all(|host| host == "10.0.0.5:22"));
}

#[test]
fn test_unknown_state_fails_before_io() {
    let shell = Arc::new(FakeShell::default());
    let result = block_on(set_power(&computer(&shell), "hibernate"));
    assert!(matches!(result, Err(Error::UnsupportedState(state)) if state == "hibernate"));
    assert!(shell.commands().is_empty());
}

#[test]
fn test_set_power_accepts_aliases() {
    let shell = Arc::new(FakeShell::default());
    let pc = computer(&shell);
    block_on(set_power(&pc, "suspend")).unwrap();
    block_on(set_power(&pc, "reboot")).unwrap();
    assert_eq!(shell.commands(), vec!["sudo systemctl suspend", "sudo reboot"]);
}

#[test]
fn test_remote_failure_is_reported() {
    let shell = Arc::new(FakeShell {
        unreachable: true,
        ..Default::default()
    });
    let result = block_on(computer(&shell).power(PowerState::Off));
    assert!(matches!(result, Err(Error::RemoteCommand { .. })));
}

#[test]
fn test_reboot_to_selects_entry_then_restarts() {
    let shell = Arc::new(FakeShell::default());
    block_on(computer(&shell).reboot_to(2)).unwrap();
    assert_eq!(
        shell.commands(),
        vec!["sudo grub-reboot 2", "sudo grub2-reboot 2", "sudo reboot"]
    );
}

#[test]
fn test_virtual_machines() {
    let shell = Arc::new(FakeShell {
        output: " Id   Name      State\n----------------------------\n 1    win10     running\n -    ubuntu    shut off\n"
            .to_string(),
        ..Default::default()
    });
    let pc = computer(&shell);

    let vms = block_on(pc.list_vms()).unwrap();
    let summary: Vec<(&str, &str)> = vms
        .iter()
        .map(|vm| (vm.name.as_str(), vm.status.as_str()))
        .collect();
    assert_eq!(summary, vec![("win10", "running"), ("ubuntu", "shut off")]);

    block_on(pc.start_vm("my vm")).unwrap();
    assert_eq!(shell.commands().last().unwrap(), "virsh start 'my vm'");
}

#[test]
fn test_executor_routes_vm_actions() {
    let shell = Arc::new(FakeShell::default());
    let mut registry = DeviceRegistry::new();
    registry.insert("desktop", Device::Computer(computer(&shell)));
    let executor = Executor::new(registry);
    let device = executor.registry().get("desktop").unwrap();

    let outcome = block_on(executor.run(
        device,
        &Action::StopVm {
            name: "win10".to_string(),
        },
    ))
    .unwrap();
    assert_eq!(outcome, TaskOutcome::Completed);
    assert_eq!(shell.commands(), vec!["virsh shutdown 'win10'"]);

    let unsupported = block_on(executor.run(device, &Action::Sunlight));
    assert!(matches!(unsupported, Err(Error::UnsupportedAction { .. })));
}
