//! Durable queue backend.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use uuid::Uuid;

use super::{AsyncTask, Backend, DispatchHandle, Dispatcher};
use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

/// Storage shared by dispatchers and workers.
///
/// The broker holds tasks until their ETA; workers claim due tasks so that
/// each task is handed out at most once.
pub trait Broker: Send + Sync + fmt::Debug {
    /// Store `task` to become due at `eta`.
    fn enqueue(&self, task: &AsyncTask, eta: DateTime<Utc>) -> Result<()>;

    /// Claim up to `limit` tasks due at `now`, earliest first.
    fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<AsyncTask>>;

    /// Forget a claimed task once it has run (or failed).
    fn complete(&self, id: &Uuid) -> Result<()>;

    /// Number of tasks not yet claimed.
    fn pending(&self) -> Result<usize>;
}

/// [`Broker`] backed by a spool directory.
///
/// Pending tasks live in `pending/` as `{eta millis}-{id}.json`, so a
/// directory listing sorted by name is sorted by ETA. Claiming renames the
/// file into `claimed/`; the rename is atomic, so concurrent workers never
/// claim the same task. Files are written under a temporary name first.
/// Entries that cannot be read back as tasks are moved to `rejected/`.
#[derive(Debug, Clone)]
pub struct SpoolBroker {
    root: PathBuf,
}

const PENDING: &str = "pending";
const CLAIMED: &str = "claimed";
const REJECTED: &str = "rejected";

impl SpoolBroker {
    /// Open (creating if needed) the spool at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        for dir in [PENDING, CLAIMED, REJECTED] {
            fs::create_dir_all(root.join(dir))
                .map_err(|e| Error::dispatch(&format!("create spool {}", root.display()), e))?;
        }
        Ok(SpoolBroker { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pending_dir(&self) -> PathBuf {
        self.root.join(PENDING)
    }

    fn claimed_path(&self, id: &Uuid) -> PathBuf {
        self.root.join(CLAIMED).join(format!("{id}.json"))
    }

    /// Move an unreadable spool entry out of the way, into `rejected/`.
    fn reject(&self, staging: &Path, name: &str) {
        if let Err(e) = fs::rename(staging, self.root.join(REJECTED).join(name)) {
            error!("Failed to set aside {}: {}", name, e);
        }
    }

    /// Pending spool file names, sorted by ETA.
    fn pending_files(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.pending_dir())? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') && name.ends_with(".json") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

fn spool_name(task: &AsyncTask, eta: DateTime<Utc>) -> String {
    format!("{:020}-{}.json", eta.timestamp_millis().max(0), task.id)
}

fn eta_millis(name: &str) -> Option<i64> {
    name.split_once('-')?.0.parse().ok()
}

impl Broker for SpoolBroker {
    fn enqueue(&self, task: &AsyncTask, eta: DateTime<Utc>) -> Result<()> {
        let json = task.to_json()?;
        let tmp = self.pending_dir().join(format!(".{}.tmp", task.id));
        let path = self.pending_dir().join(spool_name(task, eta));
        fs::write(&tmp, json).map_err(|e| Error::dispatch("write spool file", e))?;
        fs::rename(&tmp, &path).map_err(|e| Error::dispatch("publish spool file", e))?;
        debug!("Spooled task {} as {}", task, path.display());
        Ok(())
    }

    fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<AsyncTask>> {
        let now = now.timestamp_millis();
        let names = self
            .pending_files()
            .map_err(|e| Error::dispatch("list spool", e))?;

        let mut claimed = Vec::new();
        for name in names {
            if claimed.len() >= limit {
                break;
            }
            match eta_millis(&name) {
                Some(eta) if eta <= now => {}
                Some(_) => break,
                None => {
                    warn!("Ignoring malformed spool file {}", name);
                    continue;
                }
            }

            let source = self.pending_dir().join(&name);
            let staging = self.root.join(CLAIMED).join(&name);
            match fs::rename(&source, &staging) {
                Ok(()) => {}
                // Another worker claimed it first
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) if claimed.is_empty() => return Err(Error::dispatch("claim spool file", e)),
                Err(e) => {
                    error!("Failed to claim spool file {}: {}", name, e);
                    break;
                }
            }

            let task = match fs::read_to_string(&staging)
                .map_err(|e| Error::dispatch("read spool file", e))
                .and_then(|contents| AsyncTask::from_json(&contents))
            {
                Ok(task) => task,
                Err(e) => {
                    error!("Rejecting unreadable task {}: {}", name, e);
                    self.reject(&staging, &name);
                    continue;
                }
            };
            match fs::rename(&staging, self.claimed_path(&task.id)) {
                Ok(()) => claimed.push(task),
                Err(e) => {
                    error!("Failed to claim task {}, returning it to the queue: {}", task, e);
                    if let Err(e) = fs::rename(&staging, &source) {
                        error!("Failed to return {} to the queue: {}", name, e);
                    }
                }
            }
        }
        Ok(claimed)
    }

    fn complete(&self, id: &Uuid) -> Result<()> {
        match fs::remove_file(self.claimed_path(id)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(Error::dispatch("remove claimed task", e))
            }
            _ => Ok(()),
        }
    }

    fn pending(&self) -> Result<usize> {
        self.pending_files()
            .map(|names| names.len())
            .map_err(|e| Error::dispatch("list spool", e))
    }
}

/// Dispatcher that enqueues tasks to a [`Broker`] with an ETA.
///
/// The delay is honored by the broker; `dispatch` never sleeps.
#[derive(Debug, Clone)]
pub struct QueueDispatcher {
    broker: Arc<dyn Broker>,
}

impl QueueDispatcher {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        QueueDispatcher { broker }
    }

    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }
}

impl Dispatcher for QueueDispatcher {
    fn backend(&self) -> Backend {
        Backend::Queue
    }

    fn dispatch(&self, task: AsyncTask) -> Result<DispatchHandle> {
        let eta = task.eta_from(Utc::now())?;
        self.broker.enqueue(&task, eta)?;
        debug!("Queued {} for {}", task, eta);
        Ok(DispatchHandle {
            id: task.id,
            backend: Backend::Queue,
            eta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Action;
    use chrono::TimeZone;
    use std::time::Duration;

    fn spool(name: &str) -> SpoolBroker {
        let dir = std::env::temp_dir().join(format!("home-hub-{name}-{}", Uuid::new_v4()));
        SpoolBroker::open(dir).unwrap()
    }

    #[test]
    fn test_spool_name_orders_by_eta() {
        let task = AsyncTask::new("lamp", Action::Sunlight, Duration::ZERO);
        let early = spool_name(&task, Utc.timestamp_millis_opt(999).unwrap());
        let late = spool_name(&task, Utc.timestamp_millis_opt(1_000).unwrap());
        assert!(early < late);
        assert_eq!(eta_millis(&early), Some(999));
    }

    #[test]
    fn test_claim_respects_eta_and_limit() {
        let broker = spool("claim");
        let now = Utc::now();
        let due: Vec<_> = (0..3)
            .map(|_| AsyncTask::new("lamp", Action::Sunlight, Duration::ZERO))
            .collect();
        for task in &due {
            broker.enqueue(task, now).unwrap();
        }
        let later = AsyncTask::new("lamp", Action::Wake, Duration::from_secs(60));
        broker
            .enqueue(&later, now + chrono::Duration::seconds(60))
            .unwrap();

        assert_eq!(broker.claim_due(now, 2).unwrap().len(), 2);
        assert_eq!(broker.claim_due(now, 10).unwrap().len(), 1);
        assert!(broker.claim_due(now, 10).unwrap().is_empty());
        assert_eq!(broker.pending().unwrap(), 1);

        let claimed = broker
            .claim_due(now + chrono::Duration::seconds(61), 10)
            .unwrap();
        assert_eq!(claimed, vec![later.clone()]);
        broker.complete(&later.id).unwrap();
        assert!(!broker.claimed_path(&later.id).exists());

        fs::remove_dir_all(broker.root()).unwrap();
    }

    #[test]
    fn test_unreadable_task_is_rejected() {
        let broker = spool("garbage");
        fs::write(broker.pending_dir().join("00000000000000000001-x.json"), "not json").unwrap();
        assert!(broker.claim_due(Utc::now(), 10).unwrap().is_empty());
        assert_eq!(broker.pending().unwrap(), 0);
        assert_eq!(fs::read_dir(broker.root().join(CLAIMED)).unwrap().count(), 0);
        assert!(broker.root().join(REJECTED).join("00000000000000000001-x.json").exists());
        fs::remove_dir_all(broker.root()).unwrap();
    }

    #[test]
    fn test_huge_delay_is_rejected() {
        let broker = Arc::new(spool("huge-delay"));
        let dispatcher = QueueDispatcher::new(broker.clone());
        let task = AsyncTask::new("lamp", Action::Wake, Duration::from_secs(1_000_000_000_000_000));
        assert!(matches!(dispatcher.dispatch(task), Err(Error::Dispatch(_))));
        assert_eq!(broker.pending().unwrap(), 0);
        fs::remove_dir_all(broker.root()).unwrap();
    }

    #[test]
    fn test_bad_entry_does_not_lose_earlier_claims() {
        let broker = spool("bad-entry");
        let task = AsyncTask::new("lamp", Action::Sunlight, Duration::ZERO);
        broker
            .enqueue(&task, Utc.timestamp_millis_opt(1_000).unwrap())
            .unwrap();
        fs::create_dir(broker.pending_dir().join("00000000000000002000-bad.json")).unwrap();

        let claimed = broker
            .claim_due(Utc.timestamp_millis_opt(3_000).unwrap(), 10)
            .unwrap();
        assert_eq!(claimed, vec![task.clone()]);
        assert_eq!(broker.pending().unwrap(), 0);
        assert!(broker.claimed_path(&task.id).exists());

        broker.complete(&task.id).unwrap();
        assert_eq!(fs::read_dir(broker.root().join(CLAIMED)).unwrap().count(), 0);
        fs::remove_dir_all(broker.root()).unwrap();
    }
}
