//! Command-line front end of the hub.
//!
//! Device commands are validated here and dispatched through the configured
//! backend; `exec` is what the local backend launches per task, `worker`
//! drains the queue backend and `serve` runs the scheduled jobs.
//!
//! Run with: home-hub --config /etc/home-hub.json --help

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use home_hub_rs::dispatch::{AsyncTask, DispatchHandle};
use home_hub_rs::scheduler::Scheduler;
use home_hub_rs::{
    Action, Color, ColorCommand, Device, Endpoint, Function, HubConfig, Mode, PowerState,
    RampHeader, Speed, runtime, send_bulb_command,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "home-hub")]
#[command(about = "Drive MagicHome bulbs, computers and wake-on-LAN targets", long_about = None)]
struct Cli {
    /// Hub configuration file (JSON)
    #[arg(short, long, global = true, env = "HOME_HUB_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a color to a bulb directly
    Color {
        /// Bulb address
        #[arg(long)]
        host: String,
        #[arg(long, default_value_t = Endpoint::BULB_PORT)]
        port: u16,
        /// Channels as r,g,b or r,g,b,w
        color: Color,
        #[arg(short, long, default_value_t = 255)]
        brightness: u8,
        /// Use the camera header (0x41) instead of 0x31
        #[arg(long)]
        camera: bool,
    },

    /// Start a built-in bulb function directly
    Function {
        #[arg(long)]
        host: String,
        #[arg(long, default_value_t = Endpoint::BULB_PORT)]
        port: u16,
        /// Function code (25-38)
        code: u8,
        /// Speed (1-31)
        #[arg(short, long, default_value_t = 31)]
        speed: u8,
    },

    /// Fade a bulb or room out of one color and into another
    Fade {
        device: String,
        /// Color to fade out of (r,g,b[,w])
        #[arg(long)]
        start: Option<Color>,
        /// Color to fade into (r,g,b[,w])
        #[arg(long)]
        stop: Option<Color>,
        #[arg(long, default_value_t = 5)]
        step: u8,
        #[arg(long)]
        camera: bool,
        /// Seconds to wait before running
        #[arg(long, value_parser = parse_delay, default_value = "0")]
        delay: Duration,
    },

    /// Set a bulb or room to the current ambient level
    Sunlight {
        device: String,
        /// Fade in with this step instead of jumping
        #[arg(long)]
        fade: Option<u8>,
        #[arg(long, value_parser = parse_delay, default_value = "0")]
        delay: Duration,
    },

    /// Change the power state of a computer (on, off, sleep, restart)
    Power {
        device: String,
        state: String,
        #[arg(long, value_parser = parse_delay, default_value = "0")]
        delay: Duration,
    },

    /// Wake a computer or wake-on-LAN target
    Wake {
        device: String,
        #[arg(long, value_parser = parse_delay, default_value = "0")]
        delay: Duration,
    },

    /// List the virtual machines of a computer
    Vms { device: String },

    /// Dispatch any action given as JSON, e.g. '{"method": "start_vm", "params": {"name": "win10"}}'
    Dispatch {
        device: String,
        action: String,
        #[arg(long, value_parser = parse_delay, default_value = "0")]
        delay: Duration,
    },

    /// Run a task now, in this process
    Exec {
        /// Task as JSON
        task: String,
    },

    /// Run queued tasks
    Worker {
        /// Run one round of due tasks and exit
        #[arg(long)]
        once: bool,
    },

    /// Run the configured scheduled jobs until killed
    Serve,

    /// Show the configured jobs and their next run
    Jobs,
}

fn parse_delay(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("{e}"))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<HubConfig> {
    match path {
        Some(path) => {
            HubConfig::load(path).with_context(|| format!("loading {}", path.display()))
        }
        None => Ok(HubConfig::default()),
    }
}

fn dispatch(
    config: &HubConfig,
    config_path: Option<&Path>,
    device: &str,
    action: Action,
    delay: Duration,
) -> anyhow::Result<DispatchHandle> {
    let hub = config.hub(config_path)?;
    let handle = hub.dispatch(device, action, delay);
    hub.shutdown();
    let handle = handle?;
    println!(
        "Dispatched {} via {} backend, due {}",
        handle.id,
        handle.backend,
        handle.eta.to_rfc3339()
    );
    Ok(handle)
}

fn header(camera: bool) -> RampHeader {
    if camera {
        RampHeader::Camera
    } else {
        RampHeader::Color
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Color {
            host,
            port,
            color,
            brightness,
            camera,
        } => {
            let mode = if camera { Mode::Camera } else { Mode::Color };
            let command = ColorCommand::color(color)
                .with_brightness(brightness)
                .with_mode(mode);
            let delivery = send_bulb_command(&Endpoint::new(&host, port), &command).await?;
            println!("{host}:{port}: {delivery:?}");
        }

        Commands::Function {
            host,
            port,
            code,
            speed,
        } => {
            let function = Function::try_from(code)?;
            let speed = Speed::try_from(speed)?;
            let command = ColorCommand::function(function, speed);
            let delivery = send_bulb_command(&Endpoint::new(&host, port), &command).await?;
            println!("{host}:{port}: {delivery:?}");
        }

        Commands::Fade {
            device,
            start,
            stop,
            step,
            camera,
            delay,
        } => {
            if start.is_none() && stop.is_none() {
                bail!("fade needs --start and/or --stop");
            }
            let config = load_config(config_path)?;
            let action = Action::Fade {
                start: start.map(ColorCommand::color),
                stop: stop.map(ColorCommand::color),
                step,
                header: header(camera),
            };
            dispatch(&config, config_path, &device, action, delay)?;
        }

        Commands::Sunlight {
            device,
            fade,
            delay,
        } => {
            let config = load_config(config_path)?;
            let action = match fade {
                Some(step) => Action::FadeSunlight {
                    step,
                    header: RampHeader::default(),
                },
                None => Action::Sunlight,
            };
            dispatch(&config, config_path, &device, action, delay)?;
        }

        Commands::Power {
            device,
            state,
            delay,
        } => {
            let state: PowerState = state.parse()?;
            let config = load_config(config_path)?;
            dispatch(&config, config_path, &device, Action::Power { state }, delay)?;
        }

        Commands::Wake { device, delay } => {
            let config = load_config(config_path)?;
            dispatch(&config, config_path, &device, Action::Wake, delay)?;
        }

        Commands::Vms { device } => {
            let config = load_config(config_path)?;
            let Device::Computer(computer) = config.devices.get(&device)? else {
                bail!("{device} is not a computer");
            };
            for vm in computer.list_vms().await? {
                println!("{:<32} {}", vm.name, vm.status);
            }
        }

        Commands::Dispatch {
            device,
            action,
            delay,
        } => {
            let action: Action = serde_json::from_str(&action).context("parsing action")?;
            let config = load_config(config_path)?;
            dispatch(&config, config_path, &device, action, delay)?;
        }

        Commands::Exec { task } => {
            let task = AsyncTask::from_json(&task)?;
            let config = load_config(config_path)?;
            let outcome = config.executor().execute(&task).await?;
            println!("{}", serde_json::to_string(&outcome)?);
        }

        Commands::Worker { once } => {
            let config = load_config(config_path)?;
            let worker = config.worker()?;
            if once {
                let count = worker.run_once().await?;
                println!("Ran {count} task(s)");
            } else {
                worker.run().await;
            }
        }

        Commands::Serve => {
            let config = load_config(config_path)?;
            let hub = Arc::new(config.hub(config_path)?);
            let scheduler = Scheduler::global();
            config.schedule_jobs(scheduler, &hub)?;
            scheduler.start()?;
            println!("Scheduler running {} job(s)", scheduler.jobs().len());
            loop {
                thread::park();
            }
        }

        Commands::Jobs => {
            let config = load_config(config_path)?;
            let hub = Arc::new(config.hub(config_path)?);
            let scheduler = Scheduler::new();
            config.schedule_jobs(&scheduler, &hub)?;
            for job in scheduler.jobs() {
                let next = job
                    .next_run
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!("{:<24} {:<32} next {}", job.id, job.trigger, next);
            }
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    runtime::block_on(run(cli))
}
