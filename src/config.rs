use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError, SourceSpec};
use crate::correction::{default_levels, Execution, SearchLevel};
use crate::station::{Station, StationPreset};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid station: {0}")]
    Station(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub station: Option<StationConfig>,
    pub search: SearchConfig,
    pub sources: Vec<SourceSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StationConfig {
    Preset {
        preset: StationPreset,
    },
    Explicit {
        name: Option<String>,
        latitude_deg: f64,
        longitude_deg: f64,
        #[serde(default)]
        elevation_m: f64,
    },
}

impl StationConfig {
    pub fn to_station(&self) -> Result<Station, ConfigError> {
        match self {
            StationConfig::Preset { preset } => Ok(Station::from_preset(*preset)),
            StationConfig::Explicit {
                name,
                latitude_deg,
                longitude_deg,
                elevation_m,
            } => {
                if !(-90.0..=90.0).contains(latitude_deg) {
                    return Err(ConfigError::Station(format!(
                        "latitude {} out of range",
                        latitude_deg
                    )));
                }
                Ok(Station::new(
                    name.as_deref().unwrap_or("custom"),
                    *latitude_deg,
                    *longitude_deg,
                    *elevation_m,
                ))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 0 uses the available parallelism.
    pub workers: usize,
    pub parallel: bool,
    pub levels: Vec<SearchLevel>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            parallel: true,
            levels: default_levels(),
        }
    }
}

impl SearchConfig {
    pub fn execution(&self) -> Execution {
        if self.parallel {
            Execution::Parallel {
                workers: self.workers,
            }
        } else {
            Execution::Serial
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// The configured station, or LWA1.
    pub fn station(&self) -> Result<Station, ConfigError> {
        self.station
            .as_ref()
            .map_or_else(|| Ok(Station::default()), StationConfig::to_station)
    }

    /// Built-in bright sources plus any configured ones.
    pub fn catalog(&self) -> Result<Catalog, CatalogError> {
        Catalog::with_sources(&self.sources)
    }
}
