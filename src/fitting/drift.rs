use chrono::{DateTime, Utc};
use serde::Serialize;

use super::lm::{levenberg_marquardt, LmConfig, Model};
use super::FitError;
use crate::sky::from_unix_seconds;

/// 4 ln 2, the Gaussian exponent scale for a width given as a FWHM.
pub(crate) const FOUR_LN2: f64 = 4.0 * std::f64::consts::LN_2;

/// Starting pulse width [s]; the order of a full-day drift through a wide beam.
const INITIAL_WIDTH_S: f64 = 1000.0;

/// Unit Gaussian pulse of FWHM `width` at distance `dt` from its centre.
pub(crate) fn pulse(dt: f64, width: f64) -> f64 {
    (-FOUR_LN2 * dt * dt / (width * width)).exp()
}

/// height * pulse(t - center, width) + offset [+ slope * t]
struct DriftModel {
    linear: bool,
}

impl Model for DriftModel {
    fn num_params(&self) -> usize {
        if self.linear {
            5
        } else {
            4
        }
    }

    fn eval(&self, p: &[f64], t: f64, grad: &mut [f64]) -> f64 {
        let (height, center, width, offset) = (p[0], p[1], p[2], p[3]);
        let dt = t - center;
        let g = pulse(dt, width);
        let w2 = width * width;
        grad[0] = g;
        grad[1] = height * g * 2.0 * FOUR_LN2 * dt / w2;
        grad[2] = height * g * 2.0 * FOUR_LN2 * dt * dt / (w2 * width);
        grad[3] = 1.0;
        let mut value = height * g + offset;
        if self.linear {
            grad[4] = t;
            value += p[4] * t;
        }
        value
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DriftScanFitResult {
    /// Time of the fitted peak, in the units of the input times.
    pub transit_time: f64,
    /// offset / height of the fitted pulse.
    pub sefd_metric: f64,
    pub fwhm_seconds: f64,
    pub height: f64,
    /// Fitted width with its sign; `fwhm_seconds` is its magnitude.
    pub width: f64,
    pub offset: f64,
    pub slope: Option<f64>,
    /// The model at each input time.
    pub fitted_curve: Vec<f64>,
    pub residual_rms: f64,
}

impl DriftScanFitResult {
    /// Peak-to-trough span of the fitted curve.
    pub fn peak_power(&self) -> f64 {
        let (lo, hi) = self
            .fitted_curve
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        hi - lo
    }

    /// Beam width on the sky for a source at declination `dec` [rad].
    pub fn fwhm_degrees(&self, dec: f64) -> f64 {
        self.fwhm_seconds / 3600.0 * 15.0 * dec.cos()
    }

    /// Transit as an instant, for input times in Unix seconds.
    pub fn transit_datetime(&self) -> Option<DateTime<Utc>> {
        from_unix_seconds(self.transit_time)
    }

    /// SEFD in Jy given the true flux of the source.
    pub fn sefd_jy(&self, flux_jy: f64) -> f64 {
        flux_jy * self.sefd_metric
    }
}

/// Fit a Gaussian pulse (plus an optional linear baseline) to a drift scan.
///
/// `t` is in seconds. Times are re-referenced to their mean while fitting, so
/// Unix timestamps are fine; all reported parameters are in the input frame.
pub fn fit_driftscan(
    t: &[f64],
    power: &[f64],
    include_linear: bool,
) -> Result<DriftScanFitResult, FitError> {
    if t.len() != power.len() {
        return Err(FitError::LengthMismatch {
            x: t.len(),
            y: power.len(),
        });
    }
    let model = DriftModel {
        linear: include_linear,
    };
    let needed = model.num_params();
    if t.len() < needed {
        return Err(FitError::TooFewSamples {
            needed,
            got: t.len(),
        });
    }
    if t.iter().chain(power).any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite("input samples"));
    }

    let t_ref = t.iter().sum::<f64>() / t.len() as f64;
    let (p_min, p_max) = power
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if p_max == p_min {
        return Err(FitError::Degenerate("power series has no variation"));
    }

    let shifted: Vec<f64> = t.iter().map(|v| v - t_ref).collect();
    let mut p0 = vec![p_max - p_min, 0.0, INITIAL_WIDTH_S, p_min];
    if include_linear {
        p0.push(0.0);
    }
    let solution = levenberg_marquardt(&model, &shifted, power, &p0, &LmConfig::default())?;
    let p = &solution.params;

    let mut grad = vec![0.0; needed];
    let fitted_curve: Vec<f64> = shifted
        .iter()
        .map(|&x| model.eval(p, x, &mut grad))
        .collect();

    let (height, width) = (p[0], p[2]);
    let slope = include_linear.then(|| p[4]);
    // Back to the input frame: o + s (t - t_ref) = (o - s t_ref) + s t
    let offset = p[3] - slope.unwrap_or(0.0) * t_ref;
    if height == 0.0 {
        return Err(FitError::Degenerate("fitted pulse has zero height"));
    }

    let result = DriftScanFitResult {
        transit_time: p[1] + t_ref,
        sefd_metric: offset / height,
        fwhm_seconds: width.abs(),
        height,
        width,
        offset,
        slope,
        fitted_curve,
        residual_rms: (solution.cost / t.len() as f64).sqrt(),
    };
    log::debug!(
        "Drift scan fit: transit {:.1} s, FWHM {:.1} s, height {:.4}, offset {:.4}",
        result.transit_time,
        result.fwhm_seconds,
        result.height,
        result.offset
    );
    Ok(result)
}
