use chrono::{DateTime, Datelike, Utc};
use hifitime::Epoch;
use std::f64::consts::TAU;

/// Length of a sidereal day [s].
pub const SIDEREAL_DAY_S: f64 = 86_164.090_530_833;

/// Rate at which the hour angle of a fixed source grows [rad/s].
pub const SIDEREAL_RATE_RAD_S: f64 = TAU / SIDEREAL_DAY_S;

pub fn unix_seconds(t: DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + t.timestamp_subsec_nanos() as f64 * 1e-9
}

pub fn from_unix_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

/// The same UTC instant as a hifitime epoch.
pub fn epoch(t: DateTime<Utc>) -> Epoch {
    Epoch::from_unix_seconds(unix_seconds(t))
}

/// The year plus the fraction given by the day of year over 365.
pub fn decimal_year(t: DateTime<Utc>) -> f64 {
    t.year() as f64 + t.ordinal() as f64 / 365.0
}
