use thiserror::Error;

use crate::catalog::CatalogError;
use crate::parsing::ParsingError;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("line {line}: expected 7, 8, or 9 fields per line, found {found}")]
    Format { line: usize, found: usize },
    #[error("line {line}: invalid {field} '{value}'")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },
    #[error("line {line}: {source}")]
    InvalidTimestamp { line: usize, source: ParsingError },
    #[error("{0}")]
    UnknownSource(#[from] CatalogError),
    #[error("read error: {0}")]
    Io(#[from] std::io::Error),
}
