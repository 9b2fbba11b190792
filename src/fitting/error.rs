use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("need at least {needed} samples, got {got}")]
    TooFewSamples { needed: usize, got: usize },
    #[error("input arrays differ in length ({x} vs {y})")]
    LengthMismatch { x: usize, y: usize },
    #[error("degenerate input: {0}")]
    Degenerate(&'static str),
    #[error("solver did not converge after {0} evaluations")]
    NotConverged(usize),
    #[error("non-finite value encountered: {0}")]
    NonFinite(&'static str),
}
