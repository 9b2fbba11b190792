use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("unknown source: {0}")]
    UnknownSource(String),
    #[error("invalid coordinates for {name}: {message}")]
    InvalidCoordinates { name: String, message: String },
    #[error("duplicate source: {0}")]
    Duplicate(String),
}
