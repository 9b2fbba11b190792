use serde::Serialize;

use super::drift::{pulse, FOUR_LN2};
use super::lm::{levenberg_marquardt, LmConfig, Model};
use super::FitError;

/// Beam FWHM assumed when none was measured [deg].
pub const DEFAULT_FWHM_DEG: f64 = 2.0;

/// height * pulse(x - center, fwhm) + offset, with the width held fixed.
struct FixedWidthPulse {
    fwhm: f64,
}

impl Model for FixedWidthPulse {
    fn num_params(&self) -> usize {
        3
    }

    fn eval(&self, p: &[f64], x: f64, grad: &mut [f64]) -> f64 {
        let (height, center, offset) = (p[0], p[1], p[2]);
        let dx = x - center;
        let g = pulse(dx, self.fwhm);
        grad[0] = g;
        grad[1] = height * g * 2.0 * FOUR_LN2 * dx / (self.fwhm * self.fwhm);
        grad[2] = 1.0;
        height * g + offset
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DecOffsetFitResult {
    /// Fitted pulse centre, i.e. the declination pointing error, in the
    /// units of the input offsets.
    pub dec_error: f64,
    pub height: f64,
    pub offset: f64,
    pub fwhm: f64,
}

/// Fit peak powers measured at several declination offsets from a source.
///
/// `offsets` and `fwhm` must share units. A positive result means the source
/// sits north of its catalog declination.
pub fn fit_dec_offset(
    offsets: &[f64],
    powers: &[f64],
    fwhm: f64,
) -> Result<DecOffsetFitResult, FitError> {
    if offsets.len() != powers.len() {
        return Err(FitError::LengthMismatch {
            x: offsets.len(),
            y: powers.len(),
        });
    }
    if !fwhm.is_finite() || fwhm <= 0.0 {
        return Err(FitError::Degenerate("fixed FWHM must be positive"));
    }
    let model = FixedWidthPulse { fwhm };
    if offsets.len() < model.num_params() {
        return Err(FitError::TooFewSamples {
            needed: model.num_params(),
            got: offsets.len(),
        });
    }
    if offsets.iter().chain(powers).any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite("input samples"));
    }

    let (p_min, p_max) = powers
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if p_max == p_min {
        return Err(FitError::Degenerate("peak powers have no variation"));
    }

    let p0 = [p_max - p_min, 0.0, p_min];
    let solution = levenberg_marquardt(&model, offsets, powers, &p0, &LmConfig::default())?;
    let p = &solution.params;
    log::debug!(
        "Declination offset fit: centre {:.4}, height {:.4} after {} evaluations",
        p[1],
        p[0],
        solution.evaluations
    );

    Ok(DecOffsetFitResult {
        dec_error: p[1],
        height: p[0],
        offset: p[2],
        fwhm,
    })
}
