//! Local process fan-out backend.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, error};

use super::{AsyncTask, Backend, DispatchHandle, Dispatcher};
use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

const REAP_INTERVAL: Duration = Duration::from_secs(1);

/// Starts a task somewhere outside the dispatching process.
pub trait Launcher: Send + Sync + fmt::Debug {
    fn launch(&self, task: &AsyncTask) -> Result<()>;
}

/// Launches `<program> [--config <path>] exec '<task json>'` per task.
///
/// Children are never waited on by the caller; a reaper thread collects
/// their exit status so they do not linger as zombies.
#[derive(Debug)]
pub struct ProcessLauncher {
    program: PathBuf,
    config: Option<PathBuf>,
    reaper: Mutex<Sender<Child>>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, config: Option<&Path>) -> Self {
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || reap(receiver));
        ProcessLauncher {
            program: program.into(),
            config: config.map(Path::to_path_buf),
            reaper: Mutex::new(sender),
        }
    }

    /// Launch tasks with the currently running executable.
    pub fn current_exe(config: Option<&Path>) -> Result<Self> {
        let program = std::env::current_exe().map_err(Error::Spawn)?;
        Ok(Self::new(program, config))
    }

    /// Build the process invocation for `task` without spawning it.
    pub fn command(&self, task: &AsyncTask) -> Result<Command> {
        let mut cmd = Command::new(&self.program);
        if let Some(config) = &self.config {
            cmd.arg("--config").arg(config);
        }
        cmd.arg("exec").arg(task.to_json()?).stdin(Stdio::null());
        Ok(cmd)
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, task: &AsyncTask) -> Result<()> {
        let child = self.command(task)?.spawn().map_err(Error::Spawn)?;
        debug!("Launched {} as pid {}", task, child.id());
        // The reaper only stops once every sender is gone
        let _ = self.reaper.lock().unwrap().send(child);
        Ok(())
    }
}

fn reap(receiver: Receiver<Child>) {
    let mut children: Vec<Child> = Vec::new();
    loop {
        match receiver.recv_timeout(REAP_INTERVAL) {
            Ok(child) => children.push(child),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                for mut child in children.drain(..) {
                    let _ = child.wait();
                }
                return;
            }
        }
        children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    error!("Task process {} exited with {}", child.id(), status);
                }
                false
            }
            Ok(None) => true,
            Err(e) => {
                error!("Failed to poll task process {}: {}", child.id(), e);
                false
            }
        });
    }
}

struct Delayed {
    due: Instant,
    seq: u64,
    task: AsyncTask,
}

impl PartialEq for Delayed {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Delayed {}

impl PartialOrd for Delayed {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delayed {
    // Reversed so the max-heap pops the earliest task first
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Dispatcher that runs every task in a new process.
///
/// Zero-delay tasks are launched before `dispatch` returns, so spawn failures
/// reach the caller. Delayed tasks are held in a min-heap on a dedicated
/// thread, keyed by a monotonic deadline, and launched when due; launch
/// failures at that point can only be logged. The caller never blocks.
pub struct LocalDispatcher {
    launcher: Arc<dyn Launcher>,
    queue: Mutex<Option<Sender<(Instant, AsyncTask)>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for LocalDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalDispatcher")
            .field("launcher", &self.launcher)
            .finish_non_exhaustive()
    }
}

impl LocalDispatcher {
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        let (sender, receiver) = mpsc::channel();
        let worker = Arc::clone(&launcher);
        let handle = thread::Builder::new()
            .name("home-hub-delay".to_string())
            .spawn(move || delay_loop(receiver, worker))
            .ok();
        if handle.is_none() {
            error!("Failed to start the delay queue thread");
        }
        LocalDispatcher {
            launcher,
            queue: Mutex::new(handle.as_ref().map(|_| sender)),
            thread: Mutex::new(handle),
        }
    }
}

impl Dispatcher for LocalDispatcher {
    fn backend(&self) -> Backend {
        Backend::Local
    }

    fn dispatch(&self, task: AsyncTask) -> Result<DispatchHandle> {
        let eta = task.eta_from(Utc::now())?;
        let handle = DispatchHandle {
            id: task.id,
            backend: Backend::Local,
            eta,
        };

        if task.delay.is_zero() {
            self.launcher.launch(&task)?;
            return Ok(handle);
        }

        let due = Instant::now()
            .checked_add(task.delay)
            .ok_or_else(|| Error::Dispatch(format!("delay {:?} out of range", task.delay)))?;
        let queue = self.queue.lock().unwrap();
        let sender = queue
            .as_ref()
            .ok_or_else(|| Error::Dispatch("local dispatcher is shut down".to_string()))?;
        debug!("Delaying {} by {:?}", task, task.delay);
        sender
            .send((due, task))
            .map_err(|e| Error::dispatch("delay queue", e))?;
        Ok(handle)
    }

    /// Stop accepting tasks and wait until every delayed task is launched.
    fn shutdown(&self) {
        self.queue.lock().unwrap().take();
        if let Some(handle) = self.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LocalDispatcher {
    fn drop(&mut self) {
        // Pending tasks still launch on the detached thread
        self.queue.lock().unwrap().take();
    }
}

fn delay_loop(receiver: Receiver<(Instant, AsyncTask)>, launcher: Arc<dyn Launcher>) {
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;
    let mut open = true;

    loop {
        let now = Instant::now();
        while heap.peek().is_some_and(|next: &Delayed| next.due <= now) {
            if let Some(Delayed { task, .. }) = heap.pop() {
                if let Err(e) = launcher.launch(&task) {
                    error!("Failed to launch delayed task {}: {}", task, e);
                }
            }
        }

        let wait = heap.peek().map(|next| next.due.saturating_duration_since(now));
        if !open {
            match wait {
                Some(wait) => {
                    thread::sleep(wait);
                    continue;
                }
                None => return,
            }
        }

        let received = match wait {
            Some(wait) => receiver.recv_timeout(wait),
            None => receiver
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok((due, task)) => {
                heap.push(Delayed { due, seq, task });
                seq += 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => open = false,
        }
    }
}
