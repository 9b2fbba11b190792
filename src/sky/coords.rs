use chrono::{DateTime, Utc};
use hifitime::Duration;
use marlu::precession::precess_time;
use marlu::RADec;
use serde::Serialize;
use std::f64::consts::{PI, TAU};

use super::time::epoch;
use crate::station::Station;

/// Equatorial position [rad].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RaDec {
    pub ra: f64,
    pub dec: f64,
}

impl RaDec {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }

    /// Shift by an RA/Dec offset, keeping RA in [0, 2π).
    pub fn offset(&self, d_ra: f64, d_dec: f64) -> Self {
        Self {
            ra: wrap_two_pi(self.ra + d_ra),
            dec: self.dec + d_dec,
        }
    }

    fn to_marlu(self) -> RADec {
        RADec::from_radians(self.ra, self.dec)
    }
}

/// Horizontal position [rad]. Azimuth runs north through east.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AzEl {
    pub az: f64,
    pub el: f64,
}

impl AzEl {
    pub fn new(az: f64, el: f64) -> Self {
        Self { az, el }
    }

    pub fn zenith_angle(&self) -> f64 {
        PI / 2.0 - self.el
    }

    pub fn to_degrees(self) -> (f64, f64) {
        (self.az.to_degrees(), self.el.to_degrees())
    }
}

/// A station with its clock set to an instant.
#[derive(Debug, Clone, Copy)]
pub struct Observer<'a> {
    pub station: &'a Station,
    pub date: DateTime<Utc>,
}

impl<'a> Observer<'a> {
    pub fn new(station: &'a Station, date: DateTime<Utc>) -> Self {
        Self { station, date }
    }

    pub fn at(&self, date: DateTime<Utc>) -> Self {
        Self {
            station: self.station,
            date,
        }
    }

    /// Local sidereal time and latitude of the station, both referred to
    /// J2000 so that catalog positions can be used unprecessed.
    fn j2000_frame(&self, pos: RaDec) -> (f64, f64) {
        let info = precess_time(
            self.station.lon_rad(),
            self.station.lat_rad(),
            pos.to_marlu(),
            epoch(self.date),
            Duration::from_seconds(0.0),
        );
        (info.lmst_j2000, info.array_latitude_j2000)
    }

    /// Hour angle of a J2000 position, wrapped into (-π, π].
    pub fn hour_angle(&self, pos: RaDec) -> f64 {
        let (lst, _) = self.j2000_frame(pos);
        wrap_pi(lst - pos.ra)
    }

    /// Azimuth and elevation of a J2000 position.
    pub fn azel(&self, pos: RaDec) -> AzEl {
        let (lst, lat) = self.j2000_frame(pos);
        let azel = pos.to_marlu().to_hadec(lst).to_azel(lat);
        AzEl::new(wrap_two_pi(azel.az), azel.el)
    }
}

/// Great-circle separation of two (longitude, latitude) pairs [rad].
pub fn separation(a: (f64, f64), b: (f64, f64)) -> f64 {
    RADec::from_radians(a.0, a.1).separation(RADec::from_radians(b.0, b.1))
}

pub fn azel_separation(a: AzEl, b: AzEl) -> f64 {
    separation((a.az, a.el), (b.az, b.el))
}

pub fn wrap_pi(x: f64) -> f64 {
    let w = wrap_two_pi(x);
    if w > PI {
        w - TAU
    } else {
        w
    }
}

/// Wrap an angle into [0, 2π). `rem_euclid` alone can round a tiny
/// negative angle up to exactly 2π.
pub fn wrap_two_pi(x: f64) -> f64 {
    let w = x.rem_euclid(TAU);
    if w >= TAU {
        0.0
    } else {
        w
    }
}
