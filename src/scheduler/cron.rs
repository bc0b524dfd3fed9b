//! Five-field cron expressions, evaluated in UTC.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

/// Give up looking for a match after this many years.
const SEARCH_YEARS: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    bits: u64,
    /// Written as `*` (possibly with a step)
    star: bool,
}

impl Field {
    fn contains(&self, value: u32) -> bool {
        self.bits & (1u64 << value) != 0
    }

    fn parse(expr: &str, text: &str, min: u32, max: u32) -> Result<Field> {
        let mut bits = 0u64;
        let mut star = false;
        for item in text.split(',') {
            let (range, step) = match item.split_once('/') {
                Some((range, step)) => {
                    let step: u32 = step
                        .parse()
                        .map_err(|_| Error::invalid_cron(expr, format!("bad step in {item:?}")))?;
                    if step == 0 {
                        return Err(Error::invalid_cron(expr, "step must be positive"));
                    }
                    (range, step)
                }
                None => (item, 1),
            };

            let (low, high) = if range == "*" {
                star = true;
                (min, max)
            } else if let Some((low, high)) = range.split_once('-') {
                (value(expr, low, min, max)?, value(expr, high, min, max)?)
            } else {
                let low = value(expr, range, min, max)?;
                // `a/n` runs from a to the end of the range
                (low, if step > 1 { max } else { low })
            };
            if low > high {
                return Err(Error::invalid_cron(expr, format!("empty range {range:?}")));
            }

            let mut v = low;
            while v <= high {
                bits |= 1u64 << v;
                v += step;
            }
        }
        Ok(Field { bits, star })
    }
}

fn value(expr: &str, text: &str, min: u32, max: u32) -> Result<u32> {
    let v: u32 = text
        .parse()
        .map_err(|_| Error::invalid_cron(expr, format!("{text:?} is not a number")))?;
    if v < min || v > max {
        return Err(Error::invalid_cron(
            expr,
            format!("{v} outside {min}-{max}"),
        ));
    }
    Ok(v)
}

/// A parsed `minute hour day-of-month month day-of-week` expression.
///
/// Supports `*`, single values, ranges `a-b`, steps `*/n`, `a-b/n` and `a/n`,
/// and comma separated lists. Day of week is 0-7 with both 0 and 7 meaning
/// Sunday. When both day fields are restricted, a day matches if either one
/// does.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use home_hub_rs::scheduler::CronSchedule;
///
/// let schedule: CronSchedule = "30 6 * * 1-5".parse().unwrap();
/// // Saturday 2024-06-01
/// let after = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
/// assert_eq!(
///     schedule.next_after(after),
///     Some(Utc.with_ymd_and_hms(2024, 6, 3, 6, 30, 0).unwrap())
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CronSchedule {
    source: String,
    minutes: Field,
    hours: Field,
    days: Field,
    months: Field,
    weekdays: Field,
}

impl CronSchedule {
    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = self.days.contains(date.day());
        let dow = self.weekdays.contains(date.weekday().num_days_from_sunday());
        if self.days.star || self.weekdays.star {
            dom && dow
        } else {
            dom || dow
        }
    }

    /// First matching minute strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.naive_utc().with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let limit = start.date().year() + SEARCH_YEARS;

        let mut date = start.date();
        let mut time = Some(start.time());
        while date.year() <= limit {
            if !self.months.contains(date.month()) || !self.day_matches(date) {
                date = date.succ_opt()?;
                time = None;
                continue;
            }
            let from = time.unwrap_or_default();
            for hour in from.hour()..24 {
                if !self.hours.contains(hour) {
                    continue;
                }
                let first_minute = if hour == from.hour() { from.minute() } else { 0 };
                if let Some(minute) = (first_minute..60).find(|m| self.minutes.contains(*m)) {
                    let at = date.and_hms_opt(hour, minute, 0)?;
                    return Some(Utc.from_utc_datetime(&at));
                }
            }
            date = date.succ_opt()?;
            time = None;
        }
        None
    }
}

impl FromStr for CronSchedule {
    type Err = Error;

    fn from_str(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let [minute, hour, day, month, weekday] = fields[..] else {
            return Err(Error::invalid_cron(
                expr,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        };

        let mut weekdays = Field::parse(expr, weekday, 0, 7)?;
        if weekdays.contains(7) {
            weekdays.bits = (weekdays.bits | 1) & !(1 << 7);
        }

        Ok(CronSchedule {
            source: fields.join(" "),
            minutes: Field::parse(expr, minute, 0, 59)?,
            hours: Field::parse(expr, hour, 0, 23)?,
            days: Field::parse(expr, day, 1, 31)?,
            months: Field::parse(expr, month, 1, 12)?,
            weekdays,
        })
    }
}

impl TryFrom<String> for CronSchedule {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CronSchedule> for String {
    fn from(schedule: CronSchedule) -> String {
        schedule.source
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn next(expr: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        expr.parse::<CronSchedule>().unwrap().next_after(after)
    }

    #[test]
    fn test_every_minute() {
        assert_eq!(
            next("* * * * *", Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 30).unwrap()),
            Some(at(2024, 1, 1, 10, 1))
        );
    }

    #[test]
    fn test_steps_and_lists() {
        assert_eq!(next("*/15 * * * *", at(2024, 1, 1, 10, 14)), Some(at(2024, 1, 1, 10, 15)));
        assert_eq!(next("*/15 * * * *", at(2024, 1, 1, 10, 45)), Some(at(2024, 1, 1, 11, 0)));
        assert_eq!(next("0 8,20 * * *", at(2024, 1, 1, 9, 0)), Some(at(2024, 1, 1, 20, 0)));
        assert_eq!(next("5/20 * * * *", at(2024, 1, 1, 10, 30)), Some(at(2024, 1, 1, 10, 45)));
    }

    #[test]
    fn test_rolls_over_year() {
        assert_eq!(next("0 0 1 1 *", at(2024, 6, 1, 0, 0)), Some(at(2025, 1, 1, 0, 0)));
    }

    #[test]
    fn test_sunday_is_zero_or_seven() {
        // 2024-06-02 is a Sunday
        let saturday = at(2024, 6, 1, 12, 0);
        assert_eq!(next("0 9 * * 0", saturday), Some(at(2024, 6, 2, 9, 0)));
        assert_eq!(next("0 9 * * 7", saturday), Some(at(2024, 6, 2, 9, 0)));
    }

    #[test]
    fn test_day_fields_or() {
        // The 15th or any Monday, whichever is first
        assert_eq!(next("0 0 15 * 1", at(2024, 6, 1, 0, 0)), Some(at(2024, 6, 3, 0, 0)));
        assert_eq!(next("0 0 15 * 1", at(2024, 6, 10, 0, 0)), Some(at(2024, 6, 15, 0, 0)));
    }

    #[test]
    fn test_impossible_date() {
        assert_eq!(next("0 0 30 2 *", at(2024, 1, 1, 0, 0)), None);
    }

    #[test]
    fn test_rejects_bad_expressions() {
        assert!("* * * *".parse::<CronSchedule>().is_err());
        assert!("60 * * * *".parse::<CronSchedule>().is_err());
        assert!("*/0 * * * *".parse::<CronSchedule>().is_err());
        assert!("5-1 * * * *".parse::<CronSchedule>().is_err());
        assert!("a * * * *".parse::<CronSchedule>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let schedule: CronSchedule = serde_json::from_str("\"0  7 * * *\"").unwrap();
        assert_eq!(schedule.as_str(), "0 7 * * *");
        assert_eq!(serde_json::to_string(&schedule).unwrap(), "\"0 7 * * *\"");
    }
}
