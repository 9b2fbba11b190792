use serde::{Deserialize, Serialize};

use crate::sky::RaDec;

/// A source at a fixed J2000 position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixedBody {
    pub name: String,
    pub position: RaDec,
}

/// Spectral models used to predict a source's flux density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum FluxModel {
    /// log10 S = a + b log10(ν/1MHz) + c log10(ν/1MHz)^2, scaled by
    /// (1 + secular_change)^(epoch - secular_epoch).
    Baars {
        a: f64,
        #[serde(default)]
        b: f64,
        #[serde(default)]
        c: f64,
        #[serde(default)]
        secular_change: f64,
        #[serde(default = "default_secular_epoch")]
        secular_epoch: f64,
    },

    /// S = S0 (ν/ν0)^index
    PowerLaw {
        /// Flux density at the reference frequency [Jy]
        flux_jy: f64,
        /// Reference frequency [Hz]
        ref_freq_hz: f64,
        /// Spectral index
        index: f64,
    },
}

fn default_secular_epoch() -> f64 {
    2013.0
}

impl FluxModel {
    pub fn baars(a: f64, b: f64, c: f64) -> Self {
        FluxModel::Baars {
            a,
            b,
            c,
            secular_change: 0.0,
            secular_epoch: default_secular_epoch(),
        }
    }

    /// Flux density [Jy] at `freq_hz` for a date given as a decimal year.
    pub fn flux_jy(&self, freq_hz: f64, epoch_year: f64) -> f64 {
        match *self {
            FluxModel::Baars {
                a,
                b,
                c,
                secular_change,
                secular_epoch,
            } => {
                let x = (freq_hz / 1e6).log10();
                let flux = 10f64.powf(a + b * x + c * x * x);
                flux * (1.0 + secular_change).powf(epoch_year - secular_epoch)
            }
            FluxModel::PowerLaw {
                flux_jy,
                ref_freq_hz,
                index,
            } => flux_jy * (freq_hz / ref_freq_hz).powf(index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogEntry {
    FixedPosition(FixedBody),
    FixedPositionWithFluxModel { body: FixedBody, flux: FluxModel },
}

impl CatalogEntry {
    pub fn new(name: &str, position: RaDec, flux: Option<FluxModel>) -> Self {
        let body = FixedBody {
            name: name.to_string(),
            position,
        };
        match flux {
            Some(flux) => CatalogEntry::FixedPositionWithFluxModel { body, flux },
            None => CatalogEntry::FixedPosition(body),
        }
    }

    pub fn body(&self) -> &FixedBody {
        match self {
            CatalogEntry::FixedPosition(body) => body,
            CatalogEntry::FixedPositionWithFluxModel { body, .. } => body,
        }
    }

    pub fn name(&self) -> &str {
        &self.body().name
    }

    pub fn position(&self) -> RaDec {
        self.body().position
    }

    pub fn flux_model(&self) -> Option<&FluxModel> {
        match self {
            CatalogEntry::FixedPosition(_) => None,
            CatalogEntry::FixedPositionWithFluxModel { flux, .. } => Some(flux),
        }
    }

    pub fn supports_flux_prediction(&self) -> bool {
        self.flux_model().is_some()
    }

    pub fn flux_jy(&self, freq_hz: f64, epoch_year: f64) -> Option<f64> {
        self.flux_model().map(|m| m.flux_jy(freq_hz, epoch_year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn baars_at_one_mhz_is_ten_to_a() {
        let m = FluxModel::baars(3.0, -0.5, 0.1);
        assert_relative_eq!(m.flux_jy(1e6, 2013.0), 1000.0, max_relative = 1e-12);
    }

    #[test]
    fn baars_cyg_a_at_74_mhz() {
        let m = FluxModel::baars(4.695, 0.085, -0.178);
        let x = 74f64.log10();
        let expected = 10f64.powf(4.695 + 0.085 * x - 0.178 * x * x);
        assert_relative_eq!(m.flux_jy(74e6, 2013.0), expected, max_relative = 1e-12);
        // Roughly 17 kJy.
        assert!(expected > 15e3 && expected < 20e3);
    }

    #[test]
    fn secular_decrease() {
        let m = FluxModel::Baars {
            a: 5.625,
            b: -0.634,
            c: -0.023,
            secular_change: -0.0084,
            secular_epoch: 1965.0,
        };
        let at_epoch = m.flux_jy(74e6, 1965.0);
        let later = m.flux_jy(74e6, 2015.0);
        assert_relative_eq!(later / at_epoch, (1.0f64 - 0.0084).powf(50.0), max_relative = 1e-12);
        assert!(later < at_epoch);
    }

    #[test]
    fn power_law() {
        let m = FluxModel::PowerLaw {
            flux_jy: 206.0,
            ref_freq_hz: 178e6,
            index: -0.70,
        };
        assert_abs_diff_eq!(m.flux_jy(178e6, 2020.0), 206.0, epsilon = 1e-12);
        assert!(m.flux_jy(74e6, 2020.0) > 206.0);
    }

    #[test]
    fn variants_report_capability() {
        let pos = RaDec::new(0.1, 0.2);
        let plain = CatalogEntry::new("A", pos, None);
        assert!(!plain.supports_flux_prediction());
        assert_eq!(plain.flux_jy(74e6, 2013.0), None);

        let with = CatalogEntry::new("B", pos, Some(FluxModel::baars(3.0, 0.0, 0.0)));
        assert!(with.supports_flux_prediction());
        assert_eq!(with.name(), "B");
        assert_eq!(with.position(), pos);
        assert!(with.flux_jy(74e6, 2013.0).is_some());
    }

    #[test]
    fn flux_model_from_yaml() {
        let m: FluxModel = serde_yaml::from_str("{ model: baars, a: 4.695, b: 0.085, c: -0.178 }").unwrap();
        assert_eq!(m, FluxModel::baars(4.695, 0.085, -0.178));

        let m: FluxModel =
            serde_yaml::from_str("{ model: power_law, flux_jy: 1860.0, ref_freq_hz: 160000000.0, index: -2.3 }")
                .unwrap();
        assert!(matches!(m, FluxModel::PowerLaw { .. }));
    }
}
