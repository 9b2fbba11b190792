mod error;
mod types;

use serde::Deserialize;
use std::collections::BTreeMap;

pub use error::CatalogError;
pub use types::{CatalogEntry, FluxModel};

use crate::parsing::{parse_degrees, parse_hours};
use crate::sky::RaDec;

/// Bright calibrators: name, J2000 RA, J2000 Dec.
const BRIGHT_SOURCES: [(&str, &str, &str); 9] = [
    ("TauA", "05:34:32.00", "+22:00:52.0"),
    ("VirA", "12:30:49.40", "+12:23:28.0"),
    ("CygA", "19:59:28.30", "+40:44:02.0"),
    ("CasA", "23:23:27.94", "+58:48:42.4"),
    ("3C123", "04:37:04.38", "+29:40:13.8"),
    ("3C295", "14:11:20.47", "+52:12:09.5"),
    ("HerA", "16:51:08.15", "+04:59:33.3"),
    ("SgrA", "17:45:40.00", "-29:00:28.0"),
    ("HydA", "09:18:05.65", "-12:05:44.0"),
];

fn bright_source_flux(name: &str) -> Option<FluxModel> {
    // Baars et al. (1977); CasA carries the Helmboldt & Kassim (2009)
    // secular decrease of 0.84%/yr.
    let model = match name {
        "CygA" => FluxModel::baars(4.695, 0.085, -0.178),
        "TauA" => FluxModel::baars(3.915, -0.299, 0.0),
        "VirA" => FluxModel::baars(5.023, -0.856, 0.0),
        "CasA" => FluxModel::Baars {
            a: 5.625,
            b: -0.634,
            c: -0.023,
            secular_change: -0.0084,
            secular_epoch: 1965.0,
        },
        "3C295" => FluxModel::baars(1.485, 0.759, -0.255),
        "3C123" => FluxModel::PowerLaw {
            flux_jy: 206.0,
            ref_freq_hz: 178e6,
            index: -0.70,
        },
        "HydA" => FluxModel::PowerLaw {
            flux_jy: 1860.0,
            ref_freq_hz: 160e6,
            index: -2.30,
        },
        _ => return None,
    };
    Some(model)
}

/// A source as written in a configuration file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SourceSpec {
    pub name: String,
    /// J2000 right ascension, hours ("HH:MM:SS.s" or decimal)
    pub ra: String,
    /// J2000 declination, degrees ("±DD:MM:SS.s" or decimal)
    pub dec: String,
    #[serde(default)]
    pub flux: Option<FluxModel>,
}

impl SourceSpec {
    pub fn to_entry(&self) -> Result<CatalogEntry, CatalogError> {
        let invalid = |e: crate::parsing::ParsingError| CatalogError::InvalidCoordinates {
            name: self.name.clone(),
            message: e.to_string(),
        };
        let ra = parse_hours(&self.ra).map_err(invalid)?;
        let dec = parse_degrees(&self.dec).map_err(invalid)?;
        if dec.abs() > std::f64::consts::FRAC_PI_2 {
            return Err(CatalogError::InvalidCoordinates {
                name: self.name.clone(),
                message: format!("declination {} out of range", self.dec),
            });
        }
        Ok(CatalogEntry::new(&self.name, RaDec::new(ra, dec), self.flux))
    }
}

/// Immutable set of reference sources keyed by canonical name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for entry in entries {
            let name = entry.name().to_string();
            if map.insert(name.clone(), entry).is_some() {
                return Err(CatalogError::Duplicate(name));
            }
        }
        Ok(Self { entries: map })
    }

    /// The built-in bright-source list.
    pub fn bright_sources() -> Result<Self, CatalogError> {
        let entries = BRIGHT_SOURCES
            .iter()
            .map(|(name, ra, dec)| {
                SourceSpec {
                    name: name.to_string(),
                    ra: ra.to_string(),
                    dec: dec.to_string(),
                    flux: bright_source_flux(name),
                }
                .to_entry()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_entries(entries)
    }

    /// The built-in list plus extra sources.
    pub fn with_sources(extra: &[SourceSpec]) -> Result<Self, CatalogError> {
        let mut entries: Vec<CatalogEntry> = Self::bright_sources()?.entries.into_values().collect();
        for spec in extra {
            entries.push(spec.to_entry()?);
        }
        Self::from_entries(entries)
    }

    /// Exact (case-sensitive) lookup.
    pub fn get(&self, name: &str) -> Result<&CatalogEntry, CatalogError> {
        self.entries
            .get(name)
            .ok_or_else(|| CatalogError::UnknownSource(name.to_string()))
    }

    /// Case-insensitive lookup, for names typed by a user.
    pub fn find(&self, name: &str) -> Result<&CatalogEntry, CatalogError> {
        if let Ok(entry) = self.get(name) {
            return Ok(entry);
        }
        self.entries
            .values()
            .find(|e| e.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| CatalogError::UnknownSource(name.to_string()))
    }

    /// All entries in name order.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
