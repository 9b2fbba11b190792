//! Coordinate service for fixed sources. Precession, sidereal time and the
//! RA/Dec to Az/El conversion come from `marlu`; this module adds the
//! station-bound `Observer` and transit/rise/set searches.

mod coords;
mod events;
mod time;

pub use coords::{azel_separation, separation, wrap_two_pi, AzEl, Observer, RaDec};
pub use events::{nearest_transit, next_transit, rise_and_set};
pub use time::{decimal_year, from_unix_seconds, unix_seconds, SIDEREAL_DAY_S};
