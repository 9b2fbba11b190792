use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::coords::{Observer, RaDec};
use super::time::SIDEREAL_RATE_RAD_S;
use crate::station::Station;

const COARSE_STEP_SECONDS: i64 = 60; // 1 minute for initial scan
const FINE_STEP_SECONDS: i64 = 1; // 1 second for refinement

/// An elevation threshold crossing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Crossing {
    pub time: DateTime<Utc>,
    pub rising: bool,
    /// Azimuth at the crossing [rad].
    pub azimuth: f64,
}

fn seconds(s: f64) -> Duration {
    Duration::microseconds((s * 1e6).round() as i64)
}

/// Time the source next crosses the local meridian at or after `after`.
pub fn next_transit(station: &Station, pos: RaDec, after: DateTime<Utc>) -> DateTime<Utc> {
    let observer = Observer::new(station, after);
    let ha = observer.hour_angle(pos);
    let wait = (-ha).rem_euclid(std::f64::consts::TAU) / SIDEREAL_RATE_RAD_S;
    polish_transit(station, pos, after + seconds(wait))
}

/// Meridian transit closest to `near`, before or after.
pub fn nearest_transit(station: &Station, pos: RaDec, near: DateTime<Utc>) -> DateTime<Utc> {
    let ha = Observer::new(station, near).hour_angle(pos);
    polish_transit(station, pos, near - seconds(ha / SIDEREAL_RATE_RAD_S))
}

/// The sidereal rate is not exactly the hour-angle rate once precession is
/// included; one correction step absorbs the difference.
fn polish_transit(station: &Station, pos: RaDec, guess: DateTime<Utc>) -> DateTime<Utc> {
    let ha = Observer::new(station, guess).hour_angle(pos);
    guess - seconds(ha / SIDEREAL_RATE_RAD_S)
}

/// Find every crossing of `threshold_el` (radians) between `start` and `end`.
pub fn find_crossings(
    station: &Station,
    pos: RaDec,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    threshold_el: f64,
) -> Vec<Crossing> {
    let observer = Observer::new(station, start);
    let coarse_step = Duration::seconds(COARSE_STEP_SECONDS);
    let mut crossings = Vec::new();

    let mut cursor = start;
    let mut prev_above = observer.azel(pos).el >= threshold_el;

    while cursor < end {
        let next = (cursor + coarse_step).min(end);
        let above = observer.at(next).azel(pos).el >= threshold_el;
        if above != prev_above {
            crossings.push(refine_crossing(&observer, pos, cursor, next, above, threshold_el));
        }
        prev_above = above;
        cursor = next;
    }

    crossings
}

/// Binary search to find exact threshold crossing time
fn refine_crossing(
    observer: &Observer,
    pos: RaDec,
    before: DateTime<Utc>,
    after: DateTime<Utc>,
    rising: bool,
    threshold_el: f64,
) -> Crossing {
    let mut low = before;
    let mut high = after;

    while (high - low).num_seconds() > FINE_STEP_SECONDS {
        let mid = low + (high - low) / 2;
        let above = observer.at(mid).azel(pos).el >= threshold_el;
        if above == rising {
            high = mid;
        } else {
            low = mid;
        }
    }

    let point = observer.at(high).azel(pos);
    Crossing {
        time: high,
        rising,
        azimuth: point.az,
    }
}

/// First rising and first setting through `threshold_el` within one day of
/// `start`. Either is `None` when the source never crosses that elevation.
pub fn rise_and_set(
    station: &Station,
    pos: RaDec,
    start: DateTime<Utc>,
    threshold_el: f64,
) -> (Option<Crossing>, Option<Crossing>) {
    let crossings = find_crossings(station, pos, start, start + Duration::days(1), threshold_el);
    let rise = crossings.iter().find(|c| c.rising).copied();
    let set = crossings.iter().find(|c| !c.rising).copied();
    (rise, set)
}
