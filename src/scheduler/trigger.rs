//! When scheduled jobs fire.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::cron::CronSchedule;
use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

/// Firing rule of a scheduled job.
///
/// # Example
///
/// ```
/// use home_hub_rs::scheduler::Trigger;
///
/// let trigger: Trigger = serde_json::from_str(r#"{"type": "cron", "expr": "*/5 * * * *"}"#).unwrap();
/// assert_eq!(trigger.to_string(), "cron[*/5 * * * *]");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Every minute matching the expression (UTC)
    Cron { expr: CronSchedule },
    /// Every `seconds`, starting one interval after the job is added
    Interval { seconds: f64 },
    /// Once, at `at`; a time in the past fires immediately
    Date { at: DateTime<Utc> },
}

impl Trigger {
    pub fn cron(expr: &str) -> Result<Self> {
        Ok(Trigger::Cron { expr: expr.parse()? })
    }

    pub fn interval(seconds: f64) -> Self {
        Trigger::Interval { seconds }
    }

    pub fn date(at: DateTime<Utc>) -> Self {
        Trigger::Date { at }
    }

    /// Reject triggers that could never fire sensibly.
    pub fn validate(&self) -> Result<()> {
        match self {
            Trigger::Interval { seconds } if !(seconds.is_finite() && *seconds > 0.0) => Err(
                Error::InvalidTrigger(format!("interval must be positive, got {seconds}")),
            ),
            Trigger::Interval { seconds } if self.first_run(Utc::now()).is_none() => Err(
                Error::InvalidTrigger(format!("interval of {seconds}s is out of range")),
            ),
            _ => Ok(()),
        }
    }

    fn interval_duration(seconds: f64) -> Option<Duration> {
        // Float to int casts saturate, so huge intervals end up out of range here
        Duration::try_milliseconds((seconds * 1000.0).round().max(1.0) as i64)
    }

    /// First fire time for a job added at `now`.
    pub fn first_run(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Cron { expr } => expr.next_after(now),
            Trigger::Interval { seconds } => {
                now.checked_add_signed(Self::interval_duration(*seconds)?)
            }
            Trigger::Date { at } => Some(*at),
        }
    }

    /// Fire time following a run that was scheduled for `scheduled` and
    /// started at `now`.
    ///
    /// Missed runs are coalesced: a late job fires once, not once per
    /// missed slot.
    pub fn next_run(&self, scheduled: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Cron { expr } => expr.next_after(now.max(scheduled)),
            Trigger::Interval { seconds } => {
                let interval = Self::interval_duration(*seconds)?;
                match scheduled.checked_add_signed(interval) {
                    Some(next) if next > now => Some(next),
                    _ => now.checked_add_signed(interval),
                }
            }
            Trigger::Date { .. } => None,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Cron { expr } => write!(f, "cron[{expr}]"),
            Trigger::Interval { seconds } => write!(f, "interval[{seconds}s]"),
            Trigger::Date { at } => write!(f, "date[{}]", at.to_rfc3339()),
        }
    }
}
