use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SearchError {
    #[error("no measurements to fit")]
    EmptyBatch,
    #[error("no {0} candidates to search")]
    EmptyGrid(&'static str),
    #[error("invalid {axis} range: start {start}, stop {stop}, step {step}")]
    InvalidRange {
        axis: &'static str,
        start: f64,
        stop: f64,
        step: f64,
    },
    #[error("non-finite RMS at theta {theta}, phi {phi}, psi {psi}")]
    NonFinite { theta: f64, phi: f64, psi: f64 },
    #[error("search worker failed: {0}")]
    WorkerFailure(String),
}
