//! Queue worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use log::{debug, error, info};

use super::{AsyncTask, Broker};
use crate::errors::Error;
use crate::hub::Executor;
use crate::runtime;

type Result<T> = std::result::Result<T, Error>;

/// Drains due tasks from a [`Broker`] and runs them.
///
/// Each round claims at most `concurrency` tasks and runs them concurrently.
/// A claimed task is removed from the broker whether it succeeds or not, so
/// a task runs at most once.
#[derive(Debug)]
pub struct Worker {
    broker: Arc<dyn Broker>,
    executor: Arc<Executor>,
    concurrency: usize,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
}

impl Worker {
    pub const DEFAULT_CONCURRENCY: usize = 4;
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

    pub fn new(broker: Arc<dyn Broker>, executor: Arc<Executor>) -> Self {
        Worker {
            broker,
            executor,
            concurrency: Self::DEFAULT_CONCURRENCY,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Flag shared with [`Worker::run`]; storing `false` stops the loop.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run one round of due tasks. Returns how many were claimed.
    pub async fn run_once(&self) -> Result<usize> {
        let tasks = self.broker.claim_due(Utc::now(), self.concurrency)?;
        if tasks.is_empty() {
            return Ok(0);
        }
        debug!("Claimed {} task(s)", tasks.len());
        join_all(tasks.iter().map(|task| self.run_task(task))).await;
        Ok(tasks.len())
    }

    async fn run_task(&self, task: &AsyncTask) {
        match self.executor.execute(task).await {
            Ok(outcome) => info!("Task {} finished: {:?}", task, outcome),
            Err(e) => error!("Task {} failed: {}", task, e),
        }
        if let Err(e) = self.broker.complete(&task.id) {
            error!("Failed to complete task {}: {}", task, e);
        }
    }

    /// Poll the broker until [`Worker::stop`] is called.
    ///
    /// Broker errors are logged and retried after the poll interval.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!("Worker started (concurrency {})", self.concurrency);
        while self.is_running() {
            match self.run_once().await {
                Ok(0) => runtime::sleep(self.poll_interval).await,
                Ok(_) => {}
                Err(e) => {
                    error!("Worker failed to claim tasks: {}", e);
                    runtime::sleep(self.poll_interval).await;
                }
            }
        }
        info!("Worker stopped");
    }
}
