use thiserror::Error;

use crate::fitting::FitError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{label} line {line}: {message}")]
    Format {
        label: String,
        line: usize,
        message: String,
    },
    #[error("{0}: no usable samples")]
    EmptyScan(String),
    #[error("no drift scans supplied")]
    NoScans,
    #[error("time {0} is outside the representable range")]
    InvalidTime(f64),
    #[error("fit of {label} failed: {source}")]
    ScanFit {
        label: String,
        #[source]
        source: FitError,
    },
    #[error("declination offset fit failed: {0}")]
    DecFit(#[from] FitError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
