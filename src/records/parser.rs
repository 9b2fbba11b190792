use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;

use crate::catalog::Catalog;
use crate::parsing::{
    format_degrees, format_hours, parse_degrees, parse_hours, parse_record_timestamp,
    parse_sexagesimal,
};
use crate::records::error::RecordError;
use crate::records::types::MeasurementRecord;
use crate::sky::Observer;
use crate::station::Station;

/// Value given to fields a short row leaves out.
pub const SENTINEL: f64 = -1.0;

fn optional(value: f64) -> Option<f64> {
    if value == SENTINEL {
        None
    } else {
        Some(value)
    }
}

/// One row of a pointing-results file, before any sky computation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRow {
    pub line: usize,
    pub source_name: String,
    pub timestamp: DateTime<Utc>,
    pub freq_mhz: f64,
    /// [rad]
    pub zenith_angle: f64,
    /// [rad]
    pub ra_error: f64,
    /// [rad]
    pub dec_error: f64,
    pub sefd: f64,
    /// [rad]
    pub fwhm: f64,
}

impl RecordRow {
    /// Parse one line. Comments, headers and near-empty lines give `Ok(None)`.
    pub fn parse(line_no: usize, line: &str) -> Result<Option<Self>, RecordError> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.len() < 3 || line.starts_with('#') || line.starts_with("Source") {
            return Ok(None);
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let (name, date, time, freq, za, ra, dec, sefd, fwhm) = match fields.len() {
            9 => (
                fields[0], fields[1], fields[2], Some(fields[3]), fields[4], fields[5], fields[6],
                Some(fields[7]), Some(fields[8]),
            ),
            8 => (
                fields[0], fields[1], fields[2], None, fields[3], fields[4], fields[5],
                Some(fields[6]), Some(fields[7]),
            ),
            7 => (
                fields[0], fields[1], fields[2], None, fields[3], fields[4], fields[5],
                Some(fields[6]), None,
            ),
            found => {
                return Err(RecordError::Format {
                    line: line_no,
                    found,
                })
            }
        };

        let invalid = |field: &'static str, value: &str| RecordError::InvalidField {
            line: line_no,
            field,
            value: value.to_string(),
        };
        let number = |field: &'static str, value: Option<&str>| -> Result<f64, RecordError> {
            match value {
                Some(v) => v.parse::<f64>().map_err(|_| invalid(field, v)),
                None => Ok(SENTINEL),
            }
        };

        let timestamp = parse_record_timestamp(date, time).map_err(|source| {
            RecordError::InvalidTimestamp {
                line: line_no,
                source,
            }
        })?;

        // A sentinel FWHM is "-1.0" in the file, not -1 degree.
        let fwhm = match fwhm {
            Some(v) => {
                let deg = parse_sexagesimal(v).map_err(|_| invalid("FWHM", v))?;
                if deg == SENTINEL {
                    SENTINEL
                } else {
                    deg.to_radians()
                }
            }
            None => SENTINEL,
        };

        Ok(Some(Self {
            line: line_no,
            source_name: name.to_string(),
            timestamp,
            freq_mhz: number("frequency", freq)?,
            zenith_angle: parse_degrees(za).map_err(|_| invalid("zenith angle", za))?,
            ra_error: parse_hours(ra).map_err(|_| invalid("RA error", ra))?,
            dec_error: parse_degrees(dec).map_err(|_| invalid("Dec error", dec))?,
            sefd: number("SEFD", sefd)?,
            fwhm,
        }))
    }

    /// Render as a 9-field row.
    pub fn to_line(&self) -> String {
        let fwhm = if self.fwhm == SENTINEL {
            "-1.0".to_string()
        } else {
            format_degrees(self.fwhm)
        };
        format!(
            "{:<6} {:<19} {:6.3} {:<10} {:<10} {:<10} {:10.3} {:<10}",
            self.source_name,
            self.timestamp.format("%Y/%m/%d %H:%M:%S"),
            self.freq_mhz,
            format_degrees(self.zenith_angle),
            format_hours(self.ra_error),
            format_degrees(self.dec_error),
            self.sefd,
            fwhm
        )
    }
}

/// Turns rows into measurement records for one station and catalog.
pub struct Normalizer<'a> {
    station: &'a Station,
    catalog: &'a Catalog,
}

impl<'a> Normalizer<'a> {
    pub fn new(station: &'a Station, catalog: &'a Catalog) -> Self {
        Self { station, catalog }
    }

    pub fn normalize(&self, row: &RecordRow) -> Result<MeasurementRecord, RecordError> {
        let entry = self.catalog.get(&row.source_name)?;
        let observer = Observer::new(self.station, row.timestamp);

        let catalog_position = entry.position();
        let observed = observer.azel(catalog_position);
        let predicted = observer.azel(catalog_position.offset(row.ra_error, row.dec_error));

        Ok(MeasurementRecord {
            source_name: entry.name().to_string(),
            timestamp: row.timestamp,
            observed_azimuth: observed.az,
            observed_elevation: observed.el,
            predicted_azimuth: predicted.az,
            predicted_elevation: predicted.el,
            ra_error: row.ra_error,
            dec_error: row.dec_error,
            frequency_hz: optional(row.freq_mhz).map(|mhz| mhz * 1e6),
            sefd_estimate: optional(row.sefd),
            fwhm: optional(row.fwhm),
            zenith_angle: Some(row.zenith_angle),
        })
    }

    pub fn parse_line(
        &self,
        line_no: usize,
        line: &str,
    ) -> Result<Option<MeasurementRecord>, RecordError> {
        RecordRow::parse(line_no, line)?
            .map(|row| self.normalize(&row))
            .transpose()
    }

    /// Parse a whole file's contents, stopping at the first bad row.
    pub fn parse_str(&self, content: &str) -> Result<Vec<MeasurementRecord>, RecordError> {
        let mut records = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if let Some(record) = self.parse_line(i + 1, line)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Parse a whole file's contents, skipping bad rows with a warning.
    pub fn parse_str_lenient(&self, content: &str) -> (Vec<MeasurementRecord>, Vec<RecordError>) {
        let mut records = Vec::new();
        let mut errors = Vec::new();
        for (i, line) in content.lines().enumerate() {
            match self.parse_line(i + 1, line) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("Skipping record: {}", e);
                    errors.push(e);
                }
            }
        }
        (records, errors)
    }

    pub fn read_file(
        &self,
        path: &Path,
        skip_invalid: bool,
    ) -> Result<Vec<MeasurementRecord>, RecordError> {
        let content = fs::read_to_string(path)?;
        let records = if skip_invalid {
            self.parse_str_lenient(&content).0
        } else {
            self.parse_str(&content)?
        };
        log::debug!("Read {} records from {}", records.len(), path.display());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogError;
    use crate::sky::azel_separation;
    use crate::station::StationPreset;
    use approx::assert_abs_diff_eq;
    use indoc::indoc;
    use std::io::Write;

    fn setup() -> (Station, Catalog) {
        (
            Station::from_preset(StationPreset::Lwa1),
            Catalog::bright_sources().unwrap(),
        )
    }

    const RESULTS: &str = indoc! {"
        # LWA1 pointing checks
        Source YYYY/MM/DD HH:MM:SS MHz    Z          errRA      errDec      SEFD      FWHM
        CygA   2013/03/12 13:47:01 74.030 6:40:12.0  0:00:12.50 -0:12:00.0 5200.000 4:30:00.0
        CasA   2013-03-13 02:15:44.812 18:10:00.0 -0:00:05.0 0:06:00.0 4800.0 3:50:00.0
        TauA   2013/03/14 23:01:30 57:52:00.0 0:00:03.0 0:03:00.0 -1.0

    "};

    #[test]
    fn field_counts_dispatch() {
        let rows: Vec<RecordRow> = RESULTS
            .lines()
            .enumerate()
            .filter_map(|(i, l)| RecordRow::parse(i + 1, l).unwrap())
            .collect();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].source_name, "CygA");
        assert_abs_diff_eq!(rows[0].freq_mhz, 74.03, epsilon = 1e-12);
        assert_abs_diff_eq!(rows[0].fwhm.to_degrees(), 4.5, epsilon = 1e-12);
        assert_abs_diff_eq!(rows[0].ra_error, parse_hours("0:00:12.5").unwrap(), epsilon = 1e-15);

        // 8 fields: no frequency.
        assert_eq!(rows[1].freq_mhz, SENTINEL);
        assert_abs_diff_eq!(rows[1].sefd, 4800.0, epsilon = 1e-12);
        assert_eq!(rows[1].line, 4);

        // 7 fields: no frequency, no FWHM.
        assert_eq!(rows[2].freq_mhz, SENTINEL);
        assert_eq!(rows[2].fwhm, SENTINEL);
        assert_eq!(rows[2].sefd, SENTINEL);
    }

    #[test]
    fn six_fields_is_a_format_error() {
        let err = RecordRow::parse(7, "CygA 2013/03/12 13:47:01 6:40:12.0 0:00:12.50 -0:12:00.0")
            .unwrap_err();
        assert!(matches!(err, RecordError::Format { line: 7, found: 6 }));

        let err = RecordRow::parse(1, "a b c d e f g h i j").unwrap_err();
        assert!(matches!(err, RecordError::Format { found: 10, .. }));
    }

    #[test]
    fn skip_rules() {
        assert_eq!(RecordRow::parse(1, "").unwrap(), None);
        assert_eq!(RecordRow::parse(1, "ab").unwrap(), None);
        assert_eq!(RecordRow::parse(1, "# anything at all").unwrap(), None);
        assert_eq!(RecordRow::parse(1, "Source YYYY/MM/DD HH:MM:SS").unwrap(), None);
    }

    #[test]
    fn bad_fields() {
        let err = RecordRow::parse(2, "CygA 2013/03/12 13:47:01 xx 0:00:12.50 -0:12:00.0 5200")
            .unwrap_err();
        assert!(matches!(err, RecordError::InvalidField { field: "zenith angle", .. }));

        let err = RecordRow::parse(2, "CygA 2013/3/xx 13:47:01 6:40 0:00:12.50 -0:12:00.0 5200")
            .unwrap_err();
        assert!(matches!(err, RecordError::InvalidTimestamp { line: 2, .. }));
    }

    #[test]
    fn unknown_source_is_rejected() {
        let (station, catalog) = setup();
        let normalizer = Normalizer::new(&station, &catalog);
        let err = normalizer
            .parse_line(1, "Crab 2013/03/12 13:47:01 6:40:12.0 0:00:12.50 -0:12:00.0 5200")
            .unwrap_err();
        assert!(matches!(
            err,
            RecordError::UnknownSource(CatalogError::UnknownSource(ref name)) if name == "Crab"
        ));

        // Lookups while ingesting are case-sensitive.
        let err = normalizer
            .parse_line(1, "cyga 2013/03/12 13:47:01 6:40:12.0 0:00:12.50 -0:12:00.0 5200")
            .unwrap_err();
        assert!(matches!(err, RecordError::UnknownSource(_)));
    }

    #[test]
    fn normalized_positions() {
        let (station, catalog) = setup();
        let normalizer = Normalizer::new(&station, &catalog);
        let records = normalizer.parse_str(RESULTS).unwrap();
        assert_eq!(records.len(), 3);

        let cyg = &records[0];
        assert_eq!(cyg.frequency_hz, Some(74.03e6));
        assert_eq!(cyg.sefd_estimate, Some(5200.0));
        assert!(cyg.fwhm.is_some());
        assert!(cyg.observed_elevation > 0.0);

        // The predicted position is offset from the observed one by the
        // RA/Dec error, whatever the local geometry.
        let dec = catalog.get("CygA").unwrap().position().dec;
        let sep = azel_separation(cyg.observed(), cyg.predicted());
        let expected = (cyg.ra_error * dec.cos()).hypot(cyg.dec_error);
        assert_abs_diff_eq!(sep, expected, epsilon = 1e-5);

        let tau = &records[2];
        assert_eq!(tau.frequency_hz, None);
        assert_eq!(tau.fwhm, None);
        assert_eq!(tau.sefd_estimate, None);
        assert_eq!(tau.frequency_mhz(), -1.0);
    }

    #[test]
    fn zero_error_means_identical_positions() {
        let (station, catalog) = setup();
        let normalizer = Normalizer::new(&station, &catalog);
        let record = normalizer
            .parse_line(1, "VirA 2015/01/01 10:00:00 30:00:00 0:00:00 0:00:00 1000")
            .unwrap()
            .unwrap();
        assert_abs_diff_eq!(record.observed_azimuth, record.predicted_azimuth, epsilon = 1e-12);
        assert_abs_diff_eq!(record.observed_elevation, record.predicted_elevation, epsilon = 1e-12);
    }

    #[test]
    fn lenient_parsing_keeps_good_rows() {
        let (station, catalog) = setup();
        let normalizer = Normalizer::new(&station, &catalog);
        let content = format!("{}Crab 2013/03/12 13:47:01 6:40 0:00:01 0:00:01 1\nbad row here\n", RESULTS);
        let (records, errors) = normalizer.parse_str_lenient(&content);
        assert_eq!(records.len(), 3);
        assert_eq!(errors.len(), 2);
        assert!(normalizer.parse_str(&content).is_err());
    }

    #[test]
    fn reads_files() {
        let (station, catalog) = setup();
        let normalizer = Normalizer::new(&station, &catalog);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RESULTS.as_bytes()).unwrap();
        let records = normalizer.read_file(file.path(), false).unwrap();
        assert_eq!(records.len(), 3);

        let missing = normalizer.read_file(Path::new("/definitely/not/here.txt"), true);
        assert!(matches!(missing, Err(RecordError::Io(_))));
    }

    #[test]
    fn rows_render_back() {
        let row = RecordRow::parse(
            1,
            "CygA   2013/03/12 13:47:01 74.030 6:40:12.0  0:00:12.50 -0:12:00.0 5200.000 4:30:00.0",
        )
        .unwrap()
        .unwrap();
        let line = row.to_line();
        assert_eq!(line.split_whitespace().count(), 9);
        let again = RecordRow::parse(1, &line).unwrap().unwrap();
        assert_eq!(again.source_name, row.source_name);
        assert_eq!(again.timestamp, row.timestamp);
        assert_abs_diff_eq!(again.ra_error, row.ra_error, epsilon = 1e-9);
        assert_abs_diff_eq!(again.dec_error, row.dec_error, epsilon = 1e-9);
        assert_abs_diff_eq!(again.fwhm, row.fwhm, epsilon = 1e-9);
    }
}
