//! Ambient brightness from the position of the sun.
//!
//! The white level is held at 255 between sunrise and sunset and falls by
//! 200 over every 6 hours outside that window. The falloff is not clamped;
//! callers driving a bulb clamp with [`crate::ramp::clamp_white`].

use std::f64::consts::PI;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Geographic location, degrees. Longitude is positive east.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Location {
            latitude,
            longitude,
        }
    }

    /// The calendar date at this longitude's mean solar time.
    pub fn solar_date(&self, now: DateTime<Utc>) -> NaiveDate {
        let offset = Duration::seconds((self.longitude / 15.0 * 3600.0) as i64);
        (now + offset).date_naive()
    }
}

/// Sunrise and sunset for one day, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

/// Result of the sunrise equation for a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Daylight {
    Normal(SunTimes),
    /// Midnight sun
    AlwaysUp,
    /// Polar night
    AlwaysDown,
}

const J2000: f64 = 2451545.0;
const UNIX_EPOCH_JD: f64 = 2440587.5;
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;
const OBLIQUITY: f64 = 23.4397;
/// Standard refraction-corrected horizon.
const HORIZON: f64 = -0.833;

impl SunTimes {
    /// Solve the sunrise equation for `date` at `location`.
    pub fn calculate(date: NaiveDate, location: &Location) -> Daylight {
        let days = f64::from(date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE);
        let midnight_jd = days + UNIX_EPOCH_JD;

        let n = (midnight_jd - J2000 + 0.0008).ceil();
        let mean_noon = n - location.longitude / 360.0;
        let anomaly = (357.5291 + 0.98560028 * mean_noon).rem_euclid(360.0);
        let m = anomaly.to_radians();
        let center = 1.9148 * m.sin() + 0.0200 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin();
        let longitude = (anomaly + center + 180.0 + 102.9372).rem_euclid(360.0).to_radians();
        let transit = J2000 + mean_noon + 0.0053 * m.sin() - 0.0069 * (2.0 * longitude).sin();

        let declination = (longitude.sin() * OBLIQUITY.to_radians().sin()).asin();
        let latitude = location.latitude.to_radians();
        let cos_hour_angle = (HORIZON.to_radians().sin() - latitude.sin() * declination.sin())
            / (latitude.cos() * declination.cos());

        if cos_hour_angle < -1.0 {
            return Daylight::AlwaysUp;
        }
        if cos_hour_angle > 1.0 {
            return Daylight::AlwaysDown;
        }

        let half_day = cos_hour_angle.acos() / (2.0 * PI);
        Daylight::Normal(SunTimes {
            sunrise: from_julian(transit - half_day),
            sunset: from_julian(transit + half_day),
        })
    }
}

fn from_julian(jd: f64) -> DateTime<Utc> {
    let millis = ((jd - UNIX_EPOCH_JD) * 86_400_000.0).round() as i64;
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

/// Unclamped white level for `now` given the day's sun times.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use home_hub_rs::{ambient_white, SunTimes};
///
/// let sunrise = Utc.with_ymd_and_hms(2024, 3, 20, 6, 0, 0).unwrap();
/// let sunset = Utc.with_ymd_and_hms(2024, 3, 20, 18, 0, 0).unwrap();
/// let sun = SunTimes { sunrise, sunset };
///
/// assert_eq!(ambient_white(sunrise + Duration::hours(3), &sun), 255);
/// assert_eq!(ambient_white(sunset + Duration::hours(3), &sun), 155);
/// assert!(ambient_white(sunset + Duration::hours(9), &sun) < 0);
/// ```
pub fn ambient_white(now: DateTime<Utc>, sun: &SunTimes) -> i32 {
    let outside = if now < sun.sunrise {
        sun.sunrise - now
    } else if now > sun.sunset {
        now - sun.sunset
    } else {
        return 255;
    };
    let hours = outside.num_milliseconds() as f64 / 3_600_000.0;
    (255.0 - hours * 200.0 / 6.0) as i32
}

/// Supplies the ambient brightness for a moment in time.
pub trait AmbientSource: Send + Sync {
    fn ambient_brightness(&self, now: DateTime<Utc>) -> i32;
}

/// Ambient brightness from the sun at a fixed location.
#[derive(Debug, Clone, Copy)]
pub struct Sunlight {
    location: Location,
}

impl Sunlight {
    pub fn new(location: Location) -> Self {
        Sunlight { location }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

impl AmbientSource for Sunlight {
    fn ambient_brightness(&self, now: DateTime<Utc>) -> i32 {
        match SunTimes::calculate(self.location.solar_date(now), &self.location) {
            Daylight::Normal(sun) => ambient_white(now, &sun),
            Daylight::AlwaysUp => 255,
            Daylight::AlwaysDown => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes_between(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
        (a - b).num_minutes().abs()
    }

    #[test]
    fn test_equinox_at_equator() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        let Daylight::Normal(sun) = SunTimes::calculate(date, &Location::new(0.0, 0.0)) else {
            panic!("expected a normal day");
        };
        let six = Utc.with_ymd_and_hms(2024, 3, 20, 6, 0, 0).unwrap();
        let eighteen = Utc.with_ymd_and_hms(2024, 3, 20, 18, 0, 0).unwrap();
        assert!(minutes_between(sun.sunrise, six) < 15);
        assert!(minutes_between(sun.sunset, eighteen) < 15);
    }

    #[test]
    fn test_london_midsummer() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let Daylight::Normal(sun) = SunTimes::calculate(date, &Location::new(51.5074, -0.1278)) else {
            panic!("expected a normal day");
        };
        let sunrise = Utc.with_ymd_and_hms(2024, 6, 21, 3, 43, 0).unwrap();
        let sunset = Utc.with_ymd_and_hms(2024, 6, 21, 20, 21, 0).unwrap();
        assert!(minutes_between(sun.sunrise, sunrise) < 5);
        assert!(minutes_between(sun.sunset, sunset) < 5);
    }

    #[test]
    fn test_polar_days() {
        let svalbard = Location::new(78.2, 15.6);
        let june = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let december = NaiveDate::from_ymd_opt(2024, 12, 21).unwrap();
        assert_eq!(SunTimes::calculate(june, &svalbard), Daylight::AlwaysUp);
        assert_eq!(SunTimes::calculate(december, &svalbard), Daylight::AlwaysDown);
    }

    #[test]
    fn test_falloff_before_sunrise() {
        let sunrise = Utc.with_ymd_and_hms(2024, 1, 1, 7, 0, 0).unwrap();
        let sunset = Utc.with_ymd_and_hms(2024, 1, 1, 17, 0, 0).unwrap();
        let sun = SunTimes { sunrise, sunset };
        assert_eq!(ambient_white(sunrise - Duration::hours(6), &sun), 55);
        assert_eq!(ambient_white(sunrise, &sun), 255);
    }

    #[test]
    fn test_sunlight_midday_is_full() {
        let sunlight = Sunlight::new(Location::new(0.0, 0.0));
        let noon = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
        assert_eq!(sunlight.ambient_brightness(noon), 255);
    }
}
