//! Nonlinear fits of Gaussian beam pulses: drift scans in time and peak
//! powers across declination offsets.

mod declination;
mod drift;
mod error;
mod lm;

pub use declination::{fit_dec_offset, DEFAULT_FWHM_DEG};
pub use drift::{fit_driftscan, DriftScanFitResult};
pub use error::FitError;
