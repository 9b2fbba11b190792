use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::search::{search, Execution, Pointing, RotationCorrection, SearchGrid};
use super::transform::PointingCorrection;
use super::SearchError;

/// `start + k * step` for every k that stays below `stop`.
pub fn arange(
    axis: &'static str,
    start: f64,
    stop: f64,
    step: f64,
) -> Result<Vec<f64>, SearchError> {
    if !(step > 0.0 && step.is_finite() && start.is_finite() && stop.is_finite()) {
        return Err(SearchError::InvalidRange {
            axis,
            start,
            stop,
            step,
        });
    }
    let count = ((stop - start) / step).ceil().max(0.0) as usize;
    Ok((0..count).map(|k| start + k as f64 * step).collect())
}

/// Candidate values for one angle [deg].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AxisSpec {
    /// Absolute range, stop excluded.
    Range { start: f64, stop: f64, step: f64 },
    /// Centred on the previous level's answer, or on zero for a first level.
    Window { half_width: f64, step: f64 },
}

impl AxisSpec {
    pub fn values(&self, axis: &'static str, center: f64) -> Result<Vec<f64>, SearchError> {
        match *self {
            AxisSpec::Range { start, stop, step } => arange(axis, start, stop, step),
            AxisSpec::Window { half_width, step } => {
                arange(axis, center - half_width, center + half_width, step)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SearchLevel {
    pub theta: AxisSpec,
    pub phi: AxisSpec,
    pub psi: AxisSpec,
}

impl SearchLevel {
    pub fn grid(&self, previous: Option<&RotationCorrection>) -> Result<SearchGrid, SearchError> {
        let (theta, phi, psi) = previous.map_or((0.0, 0.0, 0.0), |p| (p.theta, p.phi, p.psi));
        Ok(SearchGrid {
            thetas: self.theta.values("theta", theta)?,
            phis: self.phi.values("phi", phi)?,
            psis: self.psi.values("psi", psi)?,
        })
    }
}

/// Degrees-scale sweep, then ±4° at 1°, then ±2° at 0.1°.
pub fn default_levels() -> Vec<SearchLevel> {
    let window = |half_width, step| AxisSpec::Window { half_width, step };
    vec![
        SearchLevel {
            theta: AxisSpec::Range {
                start: 0.0,
                stop: 90.0,
                step: 2.0,
            },
            phi: AxisSpec::Range {
                start: 0.0,
                stop: 360.0,
                step: 2.0,
            },
            psi: AxisSpec::Range {
                start: -10.0,
                stop: 10.0,
                step: 1.0,
            },
        },
        SearchLevel {
            theta: window(4.0, 1.0),
            phi: window(4.0, 1.0),
            psi: window(2.0, 0.5),
        },
        SearchLevel {
            theta: window(2.0, 0.1),
            phi: window(2.0, 0.1),
            psi: window(1.0, 0.1),
        },
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct LevelResult {
    /// 1-based; level 0 is the uncorrected batch.
    pub level: usize,
    pub candidates: usize,
    #[serde(skip)]
    pub elapsed: Duration,
    pub best: RotationCorrection,
}

/// Elapsed time rounded to milliseconds, for display.
pub fn format_elapsed(elapsed: Duration) -> humantime::FormattedDuration {
    humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64))
}

/// Run each level in turn, centring windows on the previous answer.
pub fn refine<C: PointingCorrection>(
    correction: &C,
    data: &[Pointing],
    levels: &[SearchLevel],
    execution: Execution,
) -> Result<Vec<LevelResult>, SearchError> {
    if levels.is_empty() {
        return Err(SearchError::EmptyGrid("level"));
    }

    let mut results: Vec<LevelResult> = Vec::with_capacity(levels.len());
    for (i, level) in levels.iter().enumerate() {
        let grid = level.grid(results.last().map(|r| &r.best))?;
        let start = Instant::now();
        let best = search(correction, data, &grid, execution)?;
        let elapsed = start.elapsed();
        log::info!(
            "Level {} ({}, {} candidates): theta {:.1}, phi {:.1}, psi {:.1} -> RMS {:.3} degrees",
            i + 1,
            format_elapsed(elapsed),
            grid.len(),
            best.theta,
            best.phi,
            best.psi,
            best.rms_error
        );
        results.push(LevelResult {
            level: i + 1,
            candidates: grid.len(),
            elapsed,
            best,
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::search::collapse;
    use crate::correction::transform::AxisRotation;
    use crate::records::MeasurementRecord;
    use approx::assert_abs_diff_eq;
    use chrono::{TimeZone, Utc};
    use indoc::indoc;

    #[test]
    fn arange_excludes_stop() {
        assert_eq!(arange("theta", 0.0, 90.0, 2.0).unwrap().len(), 45);
        assert_eq!(
            arange("psi", -2.0, 2.0, 0.5).unwrap(),
            vec![-2.0, -1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5]
        );
        assert!(arange("phi", 5.0, 1.0, 1.0).unwrap().is_empty());
        assert!(matches!(
            arange("phi", 0.0, 1.0, 0.0),
            Err(SearchError::InvalidRange { axis: "phi", .. })
        ));
    }

    #[test]
    fn default_plan_shape() {
        let levels = default_levels();
        let first = levels[0].grid(None).unwrap();
        assert_eq!(
            (first.thetas.len(), first.phis.len(), first.psis.len()),
            (45, 180, 20)
        );

        let previous = RotationCorrection {
            theta: 8.0,
            phi: 200.0,
            psi: -3.0,
            rms_error: 0.5,
        };
        let second = levels[1].grid(Some(&previous)).unwrap();
        assert_eq!(second.thetas, (4..12).map(f64::from).collect::<Vec<_>>());
        assert_eq!(second.psis.len(), 8);
        assert_abs_diff_eq!(second.psis[0], -5.0);

        let third = levels[2].grid(Some(&previous)).unwrap();
        assert_eq!((third.thetas.len(), third.psis.len()), (40, 20));
    }

    #[test]
    fn levels_from_yaml() {
        let levels: Vec<SearchLevel> = serde_yaml::from_str(indoc! {"
            - theta: { start: 0, stop: 30, step: 5 }
              phi: { start: 0, stop: 360, step: 10 }
              psi: { start: -5, stop: 5, step: 1 }
            - theta: { half_width: 5, step: 0.5 }
              phi: { half_width: 10, step: 1 }
              psi: { half_width: 1, step: 0.25 }
        "})
        .unwrap();
        assert_eq!(
            levels[0].theta,
            AxisSpec::Range {
                start: 0.0,
                stop: 30.0,
                step: 5.0
            }
        );
        assert_eq!(
            levels[1].psi,
            AxisSpec::Window {
                half_width: 1.0,
                step: 0.25
            }
        );
    }

    #[test]
    fn recovers_injected_rotation() {
        let (theta, phi, psi) = (10.0, 200.0, -3.0);
        let data: Vec<Pointing> = (0..12)
            .map(|i| {
                let pred_az = 15.0 + 30.0 * i as f64;
                let pred_el = [25.0, 50.0, 75.0][i % 3];
                let (az, el) = AxisRotation.correct(pred_az, pred_el, theta, phi, -psi);
                [az, el, pred_az, pred_el]
            })
            .collect();

        let mut levels = default_levels();
        levels[0] = SearchLevel {
            theta: AxisSpec::Range {
                start: 0.0,
                stop: 30.0,
                step: 3.0,
            },
            phi: AxisSpec::Range {
                start: 0.0,
                stop: 360.0,
                step: 3.0,
            },
            psi: AxisSpec::Range {
                start: -10.0,
                stop: 10.0,
                step: 1.0,
            },
        };

        let results = refine(
            &AxisRotation,
            &data,
            &levels,
            Execution::Parallel { workers: 0 },
        )
        .unwrap();
        assert_eq!(results.len(), 3);
        let best = results[2].best;
        assert_abs_diff_eq!(best.theta, theta, epsilon = 0.1 + 1e-9);
        assert_abs_diff_eq!(best.phi, phi, epsilon = 0.1 + 1e-9);
        assert_abs_diff_eq!(best.psi, psi, epsilon = 0.1 + 1e-9);
        assert!(best.rms_error < 0.01, "{}", best.rms_error);

        // The second level's grid contains the first level's answer.
        assert!(results[1].best.rms_error <= results[0].best.rms_error);
    }

    #[test]
    fn default_plan_recovers_rotation_from_records() {
        let (theta, phi, psi) = (10.0, 200.0, -3.0);
        let timestamp = Utc.with_ymd_and_hms(2014, 5, 1, 6, 0, 0).unwrap();
        let records: Vec<MeasurementRecord> = (0..12)
            .map(|i| {
                let pred_az = 15.0 + 30.0 * i as f64;
                let pred_el = [25.0, 50.0, 75.0][i % 3];
                let (az, el) = AxisRotation.correct(pred_az, pred_el, theta, phi, -psi);
                MeasurementRecord {
                    source_name: "CygA".to_string(),
                    timestamp,
                    observed_azimuth: az.to_radians(),
                    observed_elevation: el.to_radians(),
                    predicted_azimuth: pred_az.to_radians(),
                    predicted_elevation: pred_el.to_radians(),
                    ra_error: 0.0,
                    dec_error: 0.0,
                    frequency_hz: Some(74e6),
                    sefd_estimate: None,
                    fwhm: None,
                    zenith_angle: None,
                }
            })
            .collect();

        let data = collapse(&records);
        assert_eq!(data.len(), records.len());
        let results = refine(
            &AxisRotation,
            &data,
            &default_levels(),
            Execution::Parallel { workers: 0 },
        )
        .unwrap();

        assert_eq!(results.len(), 3);
        let best = results[2].best;
        assert_abs_diff_eq!(best.theta, theta, epsilon = 0.1 + 1e-9);
        assert_abs_diff_eq!(best.phi, phi, epsilon = 0.1 + 1e-9);
        assert_abs_diff_eq!(best.psi, psi, epsilon = 0.1 + 1e-9);
        assert!(best.rms_error < 0.01, "{}", best.rms_error);
    }

    #[test]
    fn no_levels() {
        let data = vec![[0.0, 45.0, 0.0, 45.0]];
        assert_eq!(
            refine(&AxisRotation, &data, &[], Execution::Serial).unwrap_err(),
            SearchError::EmptyGrid("level")
        );
    }
}
