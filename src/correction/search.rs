//! Exhaustive grid search for the rotation that best maps observed pointings
//! onto predicted ones.
//!
//! Candidates are visited theta-major, then phi, then psi. A candidate only
//! replaces the current best when its RMS is strictly smaller, so the first
//! minimum in that order wins. The parallel path hands out one (theta, phi)
//! pair per task and reduces the answers in pair order, giving the same result
//! as the serial path.

use crossbeam_channel::unbounded;
use serde::Serialize;
use std::thread;

use super::transform::PointingCorrection;
use super::SearchError;
use crate::records::MeasurementRecord;
use crate::sky::separation;

/// Observed az, observed el, predicted az, predicted el [deg].
pub type Pointing = [f64; 4];

/// Flatten records into the plain array the search works on.
pub fn collapse(records: &[MeasurementRecord]) -> Vec<Pointing> {
    records
        .iter()
        .map(|r| {
            [
                r.observed_azimuth.to_degrees(),
                r.observed_elevation.to_degrees(),
                r.predicted_azimuth.to_degrees(),
                r.predicted_elevation.to_degrees(),
            ]
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RotationCorrection {
    /// [deg]
    pub theta: f64,
    pub phi: f64,
    pub psi: f64,
    /// [deg]
    pub rms_error: f64,
}

/// Candidate values for each angle [deg].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchGrid {
    pub thetas: Vec<f64>,
    pub phis: Vec<f64>,
    pub psis: Vec<f64>,
}

impl SearchGrid {
    pub fn len(&self) -> usize {
        self.thetas.len() * self.phis.len() * self.psis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self, data: &[Pointing]) -> Result<(), SearchError> {
        if data.is_empty() {
            return Err(SearchError::EmptyBatch);
        }
        if self.is_empty() {
            let axis = if self.thetas.is_empty() {
                "theta"
            } else if self.phis.is_empty() {
                "phi"
            } else {
                "psi"
            };
            return Err(SearchError::EmptyGrid(axis));
        }
        Ok(())
    }

    /// (theta, phi) pairs in visiting order.
    fn pairs(&self) -> Vec<(f64, f64)> {
        self.thetas
            .iter()
            .flat_map(|&theta| self.phis.iter().map(move |&phi| (theta, phi)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Serial,
    /// Worker pool of the given size; 0 uses the available parallelism.
    Parallel { workers: usize },
}

/// RMS separation [deg] between predicted and corrected observed pointings.
pub fn rms_error<C: PointingCorrection>(
    correction: &C,
    data: &[Pointing],
    theta: f64,
    phi: f64,
    psi: f64,
) -> f64 {
    let sum_sq: f64 = data
        .iter()
        .map(|&[az, el, pred_az, pred_el]| {
            let (corr_az, corr_el) = correction.correct(az, el, theta, phi, psi);
            let sep = separation(
                (pred_az.to_radians(), pred_el.to_radians()),
                (corr_az.to_radians(), corr_el.to_radians()),
            );
            sep * sep
        })
        .sum();
    (sum_sq / data.len() as f64).sqrt().to_degrees()
}

/// Index of the first minimum over `psis` for one axis, and its RMS.
fn sweep_psi<C: PointingCorrection>(
    correction: &C,
    data: &[Pointing],
    theta: f64,
    phi: f64,
    psis: &[f64],
) -> Result<(usize, f64), SearchError> {
    let mut best: Option<(usize, f64)> = None;
    for (k, &psi) in psis.iter().enumerate() {
        let rms = rms_error(correction, data, theta, phi, psi);
        if !rms.is_finite() {
            return Err(SearchError::NonFinite { theta, phi, psi });
        }
        if best.map_or(true, |(_, b)| rms < b) {
            best = Some((k, rms));
        }
    }
    best.ok_or(SearchError::EmptyGrid("psi"))
}

/// Running best over pair results, in pair order.
#[derive(Default)]
struct Reducer {
    best: Option<RotationCorrection>,
}

impl Reducer {
    fn offer(&mut self, candidate: RotationCorrection) {
        if self
            .best
            .map_or(true, |b| candidate.rms_error < b.rms_error)
        {
            self.best = Some(candidate);
        }
    }
}

pub fn search_serial<C: PointingCorrection>(
    correction: &C,
    data: &[Pointing],
    grid: &SearchGrid,
) -> Result<RotationCorrection, SearchError> {
    grid.check(data)?;
    let mut reducer = Reducer::default();
    for (theta, phi) in grid.pairs() {
        let (k, rms) = sweep_psi(correction, data, theta, phi, &grid.psis)?;
        reducer.offer(RotationCorrection {
            theta,
            phi,
            psi: grid.psis[k],
            rms_error: rms,
        });
    }
    reducer.best.ok_or(SearchError::EmptyGrid("theta"))
}

fn resolve_workers(requested: usize, tasks: usize) -> usize {
    let workers = if requested == 0 {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        requested
    };
    workers.clamp(1, tasks.max(1))
}

type PairOutcome = Result<(usize, f64), SearchError>;

pub fn search_parallel<C: PointingCorrection>(
    correction: &C,
    data: &[Pointing],
    grid: &SearchGrid,
    workers: usize,
) -> Result<RotationCorrection, SearchError> {
    grid.check(data)?;
    let pairs = grid.pairs();
    let workers = resolve_workers(workers, pairs.len());

    // Every task is queued before any worker starts, so workers stop on their
    // own once the queue drains.
    let (tx_task, rx_task) = unbounded();
    for (i, &(theta, phi)) in pairs.iter().enumerate() {
        // The receiver is still held here.
        let _ = tx_task.send((i, theta, phi));
    }
    drop(tx_task);
    let (tx_result, rx_result) = unbounded::<(usize, PairOutcome)>();

    let psis = &grid.psis;
    let (outcomes, panicked, spawned) = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for w in 0..workers {
            let rx_task = rx_task.clone();
            let tx_result = tx_result.clone();
            let spawn = thread::Builder::new()
                .name(format!("search-{}", w))
                .spawn_scoped(scope, move || {
                    for (i, theta, phi) in rx_task.iter() {
                        let outcome = sweep_psi(correction, data, theta, phi, psis);
                        if tx_result.send((i, outcome)).is_err() {
                            break;
                        }
                    }
                });
            match spawn {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    log::warn!("Could not start search worker {}: {}", w, e);
                    break;
                }
            }
        }
        drop(tx_result);

        let mut outcomes: Vec<Option<PairOutcome>> = (0..pairs.len()).map(|_| None).collect();
        for (i, outcome) in rx_result.iter() {
            outcomes[i] = Some(outcome);
        }
        let spawned = handles.len();
        let panicked = handles
            .into_iter()
            .map(|h| h.join())
            .filter(|r| r.is_err())
            .count();
        (outcomes, panicked, spawned)
    });

    if spawned == 0 {
        return Err(SearchError::WorkerFailure(
            "no worker threads could be started".to_string(),
        ));
    }
    if panicked > 0 {
        return Err(SearchError::WorkerFailure(format!(
            "{} of {} workers panicked",
            panicked, spawned
        )));
    }
    log::debug!(
        "Evaluated {} axis candidates on {} workers",
        pairs.len(),
        spawned
    );

    let mut reducer = Reducer::default();
    for (i, outcome) in outcomes.into_iter().enumerate() {
        let (theta, phi) = pairs[i];
        let (k, rms) = match outcome {
            Some(result) => result?,
            None => {
                return Err(SearchError::WorkerFailure(format!(
                    "no result for theta {}, phi {}",
                    theta, phi
                )))
            }
        };
        reducer.offer(RotationCorrection {
            theta,
            phi,
            psi: psis[k],
            rms_error: rms,
        });
    }
    reducer.best.ok_or(SearchError::EmptyGrid("theta"))
}

pub fn search<C: PointingCorrection>(
    correction: &C,
    data: &[Pointing],
    grid: &SearchGrid,
    execution: Execution,
) -> Result<RotationCorrection, SearchError> {
    match execution {
        Execution::Serial => search_serial(correction, data, grid),
        Execution::Parallel { workers } => search_parallel(correction, data, grid, workers),
    }
}
