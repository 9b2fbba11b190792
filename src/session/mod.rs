//! Drift-scan session summary.
//!
//! A session is one source observed with the beam parked at its catalog
//! position and at one-degree offsets north and south of it. Each scan is fit
//! on its own after impulsive RFI is removed. The brightest scan gives the
//! transit offset and beam width, the centre scan gives the SEFD, and the peak
//! powers across the offsets give the declination error.

mod clean;
mod error;
mod series;

pub use error::SessionError;
pub use series::DriftScan;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::f64::consts::{FRAC_PI_2, TAU};

use crate::catalog::CatalogEntry;
use crate::fitting::{fit_dec_offset, fit_driftscan, DriftScanFitResult, FitError};
use crate::records::{RecordRow, SENTINEL};
use crate::sky::{
    azel_separation, decimal_year, from_unix_seconds, nearest_transit, unix_seconds, AzEl,
    Observer, SIDEREAL_DAY_S,
};
use crate::station::Station;

/// Seconds of time to radians of right ascension.
const SECONDS_TO_RAD: f64 = TAU / 86_400.0;

/// Wrap `x` into [-period/2, period/2).
pub fn smart_mod(x: f64, period: f64) -> f64 {
    let wrapped = x.rem_euclid(period);
    if wrapped >= period / 2.0 {
        wrapped - period
    } else {
        wrapped
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub freq_hz: Option<f64>,
    /// Where the centre beam was parked. Without it the meridian transit is
    /// taken as the expected crossing.
    pub pointing: Option<AzEl>,
    /// Remove a linear baseline drift before the final fit.
    pub include_linear: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub label: String,
    /// Beam offset north of the source [deg].
    pub dec_offset: f64,
    /// Unix seconds.
    pub transit_time: f64,
    /// Observed minus expected transit [s].
    pub ra_offset_s: f64,
    pub peak_power: f64,
    pub fwhm_s: f64,
    pub fwhm_deg: f64,
    pub sefd_metric: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub source: String,
    pub expected_transit: DateTime<Utc>,
    pub freq_hz: Option<f64>,
    /// [rad]
    pub zenith_angle: f64,
    /// [rad]
    pub ra_error: f64,
    /// [rad]
    pub dec_error: f64,
    /// [rad]
    pub fwhm: f64,
    pub sefd_jy: Option<f64>,
    pub scans: Vec<ScanSummary>,
}

impl SessionSummary {
    /// The pointing-results row for this session.
    pub fn to_row(&self) -> RecordRow {
        RecordRow {
            line: 0,
            source_name: self.source.clone(),
            timestamp: self.expected_transit,
            freq_mhz: self.freq_hz.map(|f| f / 1e6).unwrap_or(SENTINEL),
            zenith_angle: self.zenith_angle,
            ra_error: self.ra_error,
            dec_error: self.dec_error,
            sefd: self.sefd_jy.unwrap_or(SENTINEL),
            fwhm: self.fwhm,
        }
    }
}

fn to_datetime(t: f64) -> Result<DateTime<Utc>, SessionError> {
    from_unix_seconds(t).ok_or(SessionError::InvalidTime(t))
}

/// When the source should cross the beam of `scan`: the sample at which it is
/// closest to `pointing`, or the meridian transit nearest the scan midpoint.
pub fn expected_transit(
    station: &Station,
    entry: &CatalogEntry,
    scan: &DriftScan,
    pointing: Option<AzEl>,
) -> Result<DateTime<Utc>, SessionError> {
    if scan.t.is_empty() {
        return Err(SessionError::EmptyScan(scan.label.clone()));
    }
    let pos = entry.position();

    let Some(beam) = pointing else {
        let mid = to_datetime(scan.midpoint())?;
        return Ok(nearest_transit(station, pos, mid));
    };

    let mut best: Option<(f64, DateTime<Utc>)> = None;
    for &t in &scan.t {
        let when = to_datetime(t)?;
        let sep = azel_separation(Observer::new(station, when).azel(pos), beam);
        if best.map_or(true, |(best_sep, _)| sep < best_sep) {
            best = Some((sep, when));
        }
    }
    best.map(|(_, when)| when)
        .ok_or_else(|| SessionError::EmptyScan(scan.label.clone()))
}

/// Fit one scan after removing outliers and scaling it to unit peak.
fn fit_scan(scan: &DriftScan, include_linear: bool) -> Result<DriftScanFitResult, FitError> {
    let mut power = scan.power.clone();
    let replaced = clean::clean_outliers(&mut power);
    if replaced > 0 {
        log::debug!("{}: replaced {} outlying samples", scan.label, replaced);
    }

    let peak = power.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if peak > 0.0 {
        for p in power.iter_mut() {
            *p /= peak;
        }
    }

    if include_linear {
        let trend = fit_driftscan(&scan.t, &power, true)?;
        let slope = trend.slope.unwrap_or(0.0);
        let head = scan.t.len().min(10);
        let base = scan.t[..head].iter().map(|t| slope * t).sum::<f64>() / head as f64;
        for (p, t) in power.iter_mut().zip(&scan.t) {
            *p -= slope * t - base;
        }
    }

    fit_driftscan(&scan.t, &power, false)
}

/// SEFD from the scan pointed straight at the source. Off-centre scans see a
/// fraction of the flux.
fn centre_sefd(fits: &[ScanSummary], flux_jy: Option<f64>) -> Option<f64> {
    let centre = fits.iter().find(|s| s.dec_offset == 0.0)?;
    flux_jy.map(|flux| flux * centre.sefd_metric)
}

pub fn summarize(
    station: &Station,
    entry: &CatalogEntry,
    scans: &[DriftScan],
    options: &SessionOptions,
) -> Result<SessionSummary, SessionError> {
    let reference = scans
        .iter()
        .find(|s| s.declination_offset() == 0.0)
        .or_else(|| scans.first())
        .ok_or(SessionError::NoScans)?;
    let transit = expected_transit(station, entry, reference, options.pointing)?;
    let t_transit = unix_seconds(transit);
    let dec = entry.position().dec;

    let mut fits = Vec::with_capacity(scans.len());
    for scan in scans {
        let fit = fit_scan(scan, options.include_linear).map_err(|source| {
            SessionError::ScanFit {
                label: scan.label.clone(),
                source,
            }
        })?;
        let summary = ScanSummary {
            label: scan.label.clone(),
            dec_offset: scan.declination_offset(),
            transit_time: fit.transit_time,
            ra_offset_s: smart_mod(fit.transit_time - t_transit, SIDEREAL_DAY_S),
            peak_power: fit.peak_power(),
            fwhm_s: fit.fwhm_seconds,
            fwhm_deg: fit.fwhm_degrees(dec),
            sefd_metric: fit.sefd_metric,
        };
        log::info!(
            "{}: transit offset {:.2} s, FWHM {:.2} s ({:.2} deg), 1/(P1/P0 - 1) {:.3}",
            summary.label,
            summary.ra_offset_s,
            summary.fwhm_s,
            summary.fwhm_deg,
            summary.sefd_metric
        );
        fits.push(summary);
    }

    // Brightest scan; the first one wins ties.
    let best = fits
        .iter()
        .fold(None::<&ScanSummary>, |best, s| match best {
            Some(b) if b.peak_power >= s.peak_power => Some(b),
            _ => Some(s),
        })
        .ok_or(SessionError::NoScans)?;

    let mut pairs: Vec<(f64, f64)> = fits.iter().map(|s| (s.dec_offset, s.peak_power)).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let (offsets, powers): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
    let dec_fit = fit_dec_offset(&offsets, &powers, best.fwhm_deg)?;

    let zenith_angle = match options.pointing {
        Some(beam) => FRAC_PI_2 - beam.el,
        None => Observer::new(station, transit).azel(entry.position()).zenith_angle(),
    };
    let flux = options
        .freq_hz
        .and_then(|f| entry.flux_jy(f, decimal_year(transit)));
    let sefd_jy = centre_sefd(&fits, flux);
    if sefd_jy.is_none() {
        log::debug!("No SEFD estimate for {}", entry.name());
    }

    Ok(SessionSummary {
        source: entry.name().to_string(),
        expected_transit: transit,
        freq_hz: options.freq_hz,
        zenith_angle,
        ra_error: best.ra_offset_s * SECONDS_TO_RAD,
        dec_error: dec_fit.dec_error.to_radians(),
        fwhm: best.fwhm_deg.to_radians(),
        sefd_jy,
        scans: fits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::station::StationPreset;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    fn gaussian(t: f64, center: f64, width: f64) -> f64 {
        (-4.0 * std::f64::consts::LN_2 * (t - center).powi(2) / (width * width)).exp()
    }

    fn scan(label: &str, t0: f64, center: f64, height: f64) -> DriftScan {
        let t: Vec<f64> = (0..=1440).map(|i| t0 - 7200.0 + 10.0 * i as f64).collect();
        let power = t
            .iter()
            .map(|&t| 2.0 + height * gaussian(t, center, 1800.0))
            .collect();
        DriftScan {
            label: label.to_string(),
            t,
            power,
        }
    }

    #[test]
    fn wraps_by_sidereal_day() {
        assert_abs_diff_eq!(smart_mod(SIDEREAL_DAY_S - 10.0, SIDEREAL_DAY_S), -10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(smart_mod(-SIDEREAL_DAY_S + 5.0, SIDEREAL_DAY_S), 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(smart_mod(42.0, SIDEREAL_DAY_S), 42.0);
    }

    #[test]
    fn summarizes_three_scans() {
        let station = Station::from_preset(StationPreset::Lwa1);
        let catalog = Catalog::bright_sources().unwrap();
        let cyg = catalog.get("CygA").unwrap();
        let start = Utc.with_ymd_and_hms(2014, 5, 1, 0, 0, 0).unwrap();
        let transit = nearest_transit(&station, cyg.position(), start);
        let t0 = unix_seconds(transit);

        let scans = vec![
            scan("CygA_north", t0, t0 + 30.0, 0.6),
            scan("CygA", t0, t0 + 30.0, 1.0),
            scan("CygA_south", t0, t0 + 30.0, 0.5),
        ];
        let options = SessionOptions {
            freq_hz: Some(74e6),
            ..Default::default()
        };
        let summary = summarize(&station, cyg, &scans, &options).unwrap();

        assert_eq!(summary.scans.len(), 3);
        assert_abs_diff_eq!(summary.ra_error / SECONDS_TO_RAD, 30.0, epsilon = 1e-2);
        assert!(summary.dec_error > 0.0);
        let expected_fwhm = 1800.0 / 3600.0 * 15.0 * cyg.position().dec.cos();
        assert_abs_diff_eq!(summary.fwhm.to_degrees(), expected_fwhm, epsilon = 1e-3);

        // Baseline 2 under a unit pulse.
        let flux = cyg.flux_jy(74e6, decimal_year(transit)).unwrap();
        assert_abs_diff_eq!(summary.sefd_jy.unwrap(), 2.0 * flux, epsilon = 1e-3 * flux);

        let row = summary.to_row();
        let parsed = RecordRow::parse(1, &row.to_line()).unwrap().unwrap();
        assert_eq!(parsed.source_name, "CygA");
        assert_abs_diff_eq!(parsed.freq_mhz, 74.0, epsilon = 1e-9);
    }

    /// LWA1, the bright-source catalog and a CygA transit in Unix seconds.
    fn cyga_transit() -> (Station, Catalog, f64) {
        let station = Station::from_preset(StationPreset::Lwa1);
        let catalog = Catalog::bright_sources().unwrap();
        let start = Utc.with_ymd_and_hms(2014, 5, 1, 0, 0, 0).unwrap();
        let transit = nearest_transit(&station, catalog.get("CygA").unwrap().position(), start);
        (station, catalog, unix_seconds(transit))
    }

    #[test]
    fn sefd_comes_from_the_centre_scan() {
        let (station, catalog, t0) = cyga_transit();
        let cyg = catalog.get("CygA").unwrap();
        let scans = vec![
            scan("CygA_north", t0, t0, 1.0),
            scan("CygA", t0, t0, 0.8),
            scan("CygA_south", t0, t0, 0.3),
        ];
        let options = SessionOptions {
            freq_hz: Some(74e6),
            ..Default::default()
        };
        let summary = summarize(&station, cyg, &scans, &options).unwrap();

        // Baseline 2 under a 0.8 pulse, not the brighter northern one.
        let flux = cyg
            .flux_jy(74e6, decimal_year(summary.expected_transit))
            .unwrap();
        assert_abs_diff_eq!(summary.sefd_jy.unwrap(), 2.5 * flux, epsilon = 1e-3 * flux);
        assert!(summary.dec_error > 0.0);
    }

    #[test]
    fn no_centre_scan_means_no_sefd() {
        let off = |label: &str, dec_offset: f64| ScanSummary {
            label: label.to_string(),
            dec_offset,
            transit_time: 0.0,
            ra_offset_s: 0.0,
            peak_power: 1.0,
            fwhm_s: 3600.0,
            fwhm_deg: 10.0,
            sefd_metric: 3.0,
        };
        let fits = vec![off("north", 1.0), off("south", -1.0)];
        assert_eq!(centre_sefd(&fits, Some(1000.0)), None);

        let fits = vec![off("north", 1.0), off("centre", 0.0)];
        assert_eq!(centre_sefd(&fits, Some(1000.0)), Some(3000.0));
        assert_eq!(centre_sefd(&fits, None), None);
    }

    #[test]
    fn spiked_sample_does_not_move_the_fit() {
        let (station, catalog, t0) = cyga_transit();
        let cyg = catalog.get("CygA").unwrap();
        let clean = vec![
            scan("CygA_north", t0, t0 + 30.0, 0.6),
            scan("CygA", t0, t0 + 30.0, 1.0),
            scan("CygA_south", t0, t0 + 30.0, 0.5),
        ];
        let mut spiked = clean.clone();
        spiked[1].power[300] *= 50.0;

        let options = SessionOptions::default();
        let a = summarize(&station, cyg, &clean, &options).unwrap();
        let b = summarize(&station, cyg, &spiked, &options).unwrap();

        assert_abs_diff_eq!(a.ra_error, b.ra_error, epsilon = 1e-6);
        assert_abs_diff_eq!(a.dec_error, b.dec_error, epsilon = 1e-6);
        assert_abs_diff_eq!(a.fwhm, b.fwhm, epsilon = 1e-6);
        assert_abs_diff_eq!(b.scans[1].peak_power, a.scans[1].peak_power, epsilon = 1e-6);
    }

    #[test]
    fn beam_pointing_sets_expected_transit() {
        let station = Station::from_preset(StationPreset::Lwa1);
        let catalog = Catalog::bright_sources().unwrap();
        let tau = catalog.get("TauA").unwrap();
        let start = Utc.with_ymd_and_hms(2014, 11, 1, 0, 0, 0).unwrap();
        let transit = nearest_transit(&station, tau.position(), start);
        let t0 = unix_seconds(transit);

        let beam_time = to_datetime(t0 + 600.0).unwrap();
        let beam = Observer::new(&station, beam_time).azel(tau.position());
        let centre = scan("TauA", t0, t0 + 600.0, 1.0);

        let expected = expected_transit(&station, tau, &centre, Some(beam)).unwrap();
        assert!((expected - beam_time).num_seconds().abs() <= 1);
    }

    #[test]
    fn no_scans() {
        let station = Station::default();
        let catalog = Catalog::bright_sources().unwrap();
        let err = summarize(&station, catalog.get("CasA").unwrap(), &[], &Default::default())
            .unwrap_err();
        assert!(matches!(err, SessionError::NoScans));
    }
}
