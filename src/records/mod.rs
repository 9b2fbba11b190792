mod error;
mod parser;
mod types;

pub use parser::{Normalizer, RecordRow, SENTINEL};
pub use types::MeasurementRecord;
