use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Known LWA stations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum StationPreset {
    #[strum(serialize = "LWA1")]
    Lwa1,
    #[strum(serialize = "LWA-SV")]
    LwaSv,
    #[strum(serialize = "LWA-NA")]
    LwaNa,
    #[strum(serialize = "OVRO-LWA")]
    OvroLwa,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub name: String,
    pub latitude_deg: f64,
    /// East positive.
    pub longitude_deg: f64,
    pub elevation_m: f64,
}

impl Default for Station {
    fn default() -> Self {
        Self::from_preset(StationPreset::Lwa1)
    }
}

impl Station {
    pub fn new(name: &str, latitude_deg: f64, longitude_deg: f64, elevation_m: f64) -> Self {
        Self {
            name: name.to_string(),
            latitude_deg,
            longitude_deg,
            elevation_m,
        }
    }

    pub fn from_preset(preset: StationPreset) -> Self {
        let (lat, lon, elev) = match preset {
            StationPreset::Lwa1 => (34.068956, -107.628418, 2133.6),
            StationPreset::LwaSv => (34.348358, -106.885783, 1477.8),
            StationPreset::LwaNa => (34.247, -107.640, 2133.6),
            StationPreset::OvroLwa => (37.23977727, -118.2816667, 1183.48),
        };
        Self::new(&preset.to_string(), lat, lon, elev)
    }

    /// Parse a "lat,lon" pair in degrees.
    pub fn from_coordinates(name: &str, coordinates: &str, elevation_m: Option<f64>) -> Option<Self> {
        let parts: Vec<_> = coordinates.split(',').map(|s| s.trim()).collect();
        if parts.len() != 2 {
            return None;
        }
        let lat: f64 = parts[0].parse().ok()?;
        let lon: f64 = parts[1].parse().ok()?;
        if !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        Some(Self::new(name, lat, lon, elevation_m.unwrap_or(0.0)))
    }

    pub fn lat_rad(&self) -> f64 {
        self.latitude_deg.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.longitude_deg.to_radians()
    }
}
