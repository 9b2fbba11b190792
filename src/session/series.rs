use std::fs;
use std::path::Path;

use super::SessionError;

/// Total power against time for one beam pointing.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftScan {
    pub label: String,
    /// Unix seconds.
    pub t: Vec<f64>,
    pub power: Vec<f64>,
}

impl DriftScan {
    /// Parse `time power` rows. Rows with a non-positive time or power were
    /// never recorded and are dropped.
    pub fn parse(label: &str, content: &str) -> Result<Self, SessionError> {
        let mut t = Vec::new();
        let mut power = Vec::new();
        let mut dropped = 0usize;

        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let format_error = |message: String| SessionError::Format {
                label: label.to_string(),
                line: i + 1,
                message,
            };

            let mut fields = line.split_whitespace();
            let (Some(ts), Some(ps)) = (fields.next(), fields.next()) else {
                return Err(format_error("expected `time power`".to_string()));
            };
            let ti: f64 = ts
                .parse()
                .map_err(|_| format_error(format!("invalid time '{}'", ts)))?;
            let pi: f64 = ps
                .parse()
                .map_err(|_| format_error(format!("invalid power '{}'", ps)))?;

            if ti > 0.0 && pi > 0.0 {
                t.push(ti);
                power.push(pi);
            } else {
                dropped += 1;
            }
        }

        if dropped > 0 {
            log::debug!("{}: dropped {} unrecorded samples", label, dropped);
        }
        if t.is_empty() {
            return Err(SessionError::EmptyScan(label.to_string()));
        }
        Ok(Self {
            label: label.to_string(),
            t,
            power,
        })
    }

    /// Read a scan file, labelled by its file stem.
    pub fn from_file(path: &Path) -> Result<Self, SessionError> {
        let content = fs::read_to_string(path)?;
        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::parse(&label, &content)
    }

    /// Beam offset in units of the offset step: +1 north, -1 south, else 0.
    pub fn declination_offset(&self) -> f64 {
        let label = self.label.to_lowercase();
        if label.contains("north") {
            1.0
        } else if label.contains("south") {
            -1.0
        } else {
            0.0
        }
    }

    pub fn midpoint(&self) -> f64 {
        match (self.t.first(), self.t.last()) {
            (Some(a), Some(b)) => 0.5 * (a + b),
            _ => 0.0,
        }
    }
}
