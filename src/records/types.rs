use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::sky::AzEl;

/// One pointing check. The observed and predicted positions are both
/// computed for the same station and instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRecord {
    pub source_name: String,
    pub timestamp: DateTime<Utc>,
    /// Where the source actually was [rad].
    pub observed_azimuth: f64,
    pub observed_elevation: f64,
    /// Catalog position plus the measured RA/Dec error [rad].
    pub predicted_azimuth: f64,
    pub predicted_elevation: f64,
    /// RA/Dec pointing error [rad].
    pub ra_error: f64,
    pub dec_error: f64,
    pub frequency_hz: Option<f64>,
    pub sefd_estimate: Option<f64>,
    /// [rad]
    pub fwhm: Option<f64>,
    /// [rad]
    pub zenith_angle: Option<f64>,
}

impl MeasurementRecord {
    pub fn observed(&self) -> AzEl {
        AzEl::new(self.observed_azimuth, self.observed_elevation)
    }

    pub fn predicted(&self) -> AzEl {
        AzEl::new(self.predicted_azimuth, self.predicted_elevation)
    }

    /// Frequency in MHz, or -1.0 when the row had none.
    pub fn frequency_mhz(&self) -> f64 {
        self.frequency_hz.map(|f| f / 1e6).unwrap_or(-1.0)
    }
}
