//! Pointing-correction fit: a rotation about an arbitrary axis, found by a
//! multi-resolution grid search over (theta, phi, psi).

mod error;
mod levels;
mod search;
mod stats;
mod transform;

pub use error::SearchError;
pub use levels::{default_levels, format_elapsed, refine, AxisSpec, LevelResult, SearchLevel};
pub use search::{collapse, rms_error, Execution};
pub use stats::{corrected_errors, raw_errors, ErrorStats};
pub use transform::AxisRotation;
