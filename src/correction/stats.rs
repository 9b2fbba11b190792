use serde::Serialize;

use super::search::RotationCorrection;
use super::transform::PointingCorrection;
use crate::records::MeasurementRecord;
use crate::sky::{azel_separation, AzEl};

/// Summary of pointing errors against zenith angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorStats {
    pub count: usize,
    /// [deg]
    pub mean: f64,
    /// [deg]
    pub rms: f64,
    /// Least-squares slope of error against zenith angle [deg/deg].
    pub slope: Option<f64>,
    /// Pearson correlation of error with zenith angle.
    pub r_value: Option<f64>,
}

impl ErrorStats {
    /// From (zenith angle, error) pairs in degrees. `None` when empty.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Option<Self> {
        if pairs.is_empty() {
            return None;
        }
        let n = pairs.len() as f64;
        let mean_z = pairs.iter().map(|p| p.0).sum::<f64>() / n;
        let mean = pairs.iter().map(|p| p.1).sum::<f64>() / n;
        let rms = (pairs.iter().map(|p| p.1 * p.1).sum::<f64>() / n).sqrt();

        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for &(z, e) in pairs {
            let (dz, de) = (z - mean_z, e - mean);
            sxx += dz * dz;
            syy += de * de;
            sxy += dz * de;
        }
        let slope = (sxx > 0.0).then(|| sxy / sxx);
        let r_value = (sxx > 0.0 && syy > 0.0).then(|| sxy / (sxx * syy).sqrt());

        Some(Self {
            count: pairs.len(),
            mean,
            rms,
            slope,
            r_value,
        })
    }
}

fn zenith_deg(record: &MeasurementRecord) -> f64 {
    record
        .zenith_angle
        .unwrap_or_else(|| record.observed().zenith_angle())
        .to_degrees()
}

/// (zenith angle, separation of observed from predicted) in degrees.
pub fn raw_errors(records: &[MeasurementRecord]) -> Vec<(f64, f64)> {
    records
        .iter()
        .map(|r| {
            let sep = azel_separation(r.observed(), r.predicted());
            (zenith_deg(r), sep.to_degrees())
        })
        .collect()
}

/// As [`raw_errors`], after applying `best` to the observed pointings.
pub fn corrected_errors<C: PointingCorrection>(
    correction: &C,
    records: &[MeasurementRecord],
    best: &RotationCorrection,
) -> Vec<(f64, f64)> {
    records
        .iter()
        .map(|r| {
            let (az, el) = correction.correct(
                r.observed_azimuth.to_degrees(),
                r.observed_elevation.to_degrees(),
                best.theta,
                best.phi,
                best.psi,
            );
            let corrected = AzEl::new(az.to_radians(), el.to_radians());
            let sep = azel_separation(corrected, r.predicted());
            (zenith_deg(r), sep.to_degrees())
        })
        .collect()
}
