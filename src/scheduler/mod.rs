//! Background job scheduler.
//!
//! Jobs fire one after another on a single dedicated thread. The registry is
//! guarded by a mutex that is released while a job body runs, so bodies may
//! add or remove jobs. A body that blocks stalls every other job; bodies that
//! drive devices should only dispatch (see [`ScheduledJob::dispatch`]).

mod cron;
mod trigger;

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::Serialize;

use crate::device::Action;
use crate::errors::Error;
use crate::hub::Hub;

pub use cron::CronSchedule;
pub use trigger::Trigger;

type Result<T> = std::result::Result<T, Error>;

/// Longest the scheduler thread sleeps between checks.
const TICK: Duration = Duration::from_millis(250);

pub type JobBody = Arc<dyn Fn() + Send + Sync>;

/// A job: an id, a trigger and a body to run when the trigger fires.
#[derive(Clone)]
pub struct ScheduledJob {
    id: String,
    trigger: Trigger,
    body: JobBody,
}

impl fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

impl ScheduledJob {
    pub fn new<F>(id: &str, trigger: Trigger, body: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        ScheduledJob {
            id: id.to_string(),
            trigger,
            body: Arc::new(body),
        }
    }

    /// A job whose body only dispatches `action` through `hub`.
    pub fn dispatch(
        id: &str,
        trigger: Trigger,
        hub: Arc<Hub>,
        device: &str,
        action: Action,
        delay: Duration,
    ) -> Self {
        let job_id = id.to_string();
        let device = device.to_string();
        Self::new(id, trigger, move || {
            match hub.dispatch(&device, action.clone(), delay) {
                Ok(handle) => debug!("Job {} dispatched task {}", job_id, handle.id),
                Err(e) => error!("Job {} failed to dispatch: {}", job_id, e),
            }
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }
}

/// A registered job as reported by [`Scheduler::jobs`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub trigger: Trigger,
    pub next_run: Option<DateTime<Utc>>,
}

struct Entry {
    job: ScheduledJob,
    next_run: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Shared {
    jobs: Mutex<BTreeMap<String, Entry>>,
    running: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Registry of scheduled jobs plus the thread that fires them.
///
/// [`Scheduler::global`] is the process-wide instance; separate instances
/// can be built with [`Scheduler::new`].
#[derive(Clone, Default)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("jobs", &self.shared.jobs.lock().unwrap().len())
            .field("running", &self.is_running())
            .finish()
    }
}

static GLOBAL: OnceLock<Scheduler> = OnceLock::new();

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide scheduler.
    pub fn global() -> &'static Scheduler {
        GLOBAL.get_or_init(Scheduler::new)
    }

    /// Register `job`. Ids must be unique.
    pub fn add_job(&self, job: ScheduledJob) -> Result<()> {
        job.trigger.validate()?;
        let mut jobs = self.shared.jobs.lock().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(Error::DuplicateJob(job.id));
        }
        let next_run = job.trigger.first_run(Utc::now());
        info!("Added job {} ({}), next run {:?}", job.id, job.trigger, next_run);
        jobs.insert(job.id.clone(), Entry { job, next_run });
        Ok(())
    }

    pub fn jobs(&self) -> Vec<JobInfo> {
        self.shared
            .jobs
            .lock()
            .unwrap()
            .values()
            .map(|entry| JobInfo {
                id: entry.job.id.clone(),
                trigger: entry.job.trigger.clone(),
                next_run: entry.next_run,
            })
            .collect()
    }

    /// Remove one job. Returns `true` if it existed.
    pub fn remove_job(&self, id: &str) -> bool {
        self.shared.jobs.lock().unwrap().remove(id).is_some()
    }

    pub fn remove_all(&self) {
        let mut jobs = self.shared.jobs.lock().unwrap();
        info!("Removing {} job(s)", jobs.len());
        jobs.clear();
    }

    /// Fire every job due at `now`, sequentially. Returns how many ran.
    ///
    /// Next run times are recorded (and finished one-shot jobs removed)
    /// before any body runs.
    pub fn run_pending(&self, now: DateTime<Utc>) -> usize {
        let due: Vec<(String, JobBody)> = {
            let mut jobs = self.shared.jobs.lock().unwrap();
            let mut due = Vec::new();
            jobs.retain(|id, entry| {
                let Some(scheduled) = entry.next_run.filter(|at| *at <= now) else {
                    return true;
                };
                due.push((id.clone(), Arc::clone(&entry.job.body)));
                entry.next_run = entry.job.trigger.next_run(scheduled, now);
                entry.next_run.is_some()
            });
            due
        };

        for (id, body) in &due {
            debug!("Running job {}", id);
            if panic::catch_unwind(AssertUnwindSafe(|| body())).is_err() {
                error!("Job {} panicked", id);
            }
        }
        due.len()
    }

    /// Earliest next run across all jobs.
    fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        self.shared
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter_map(|entry| entry.next_run)
            .min()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Start the scheduler thread. Does nothing if it is already running.
    pub fn start(&self) -> Result<()> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let scheduler = self.clone();
        let handle = thread::Builder::new()
            .name("home-hub-scheduler".to_string())
            .spawn(move || scheduler.run_loop())
            .map_err(|e| {
                self.shared.running.store(false, Ordering::SeqCst);
                Error::Spawn(e)
            })?;
        *self.shared.thread.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn run_loop(&self) {
        info!("Scheduler started");
        while self.is_running() {
            self.run_pending(Utc::now());
            let wait = self
                .next_wakeup()
                .and_then(|next| (next - Utc::now()).to_std().ok())
                .map_or(TICK, |until| until.min(TICK));
            thread::park_timeout(wait);
        }
        info!("Scheduler stopped");
    }

    /// Stop the scheduler thread and wait for the running job to finish.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let handle = self.shared.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}
