mod catalog;
mod config;
mod correction;
mod fitting;
mod parsing;
mod records;
mod session;
mod sky;
mod station;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use crate::catalog::{Catalog, CatalogEntry};
use crate::config::Config;
use crate::correction::{
    collapse, corrected_errors, format_elapsed, raw_errors, refine, rms_error, AxisRotation,
    ErrorStats, Execution, LevelResult,
};
use crate::fitting::{fit_dec_offset, fit_driftscan, DEFAULT_FWHM_DEG};
use crate::parsing::{format_degrees, format_hours, parse_record_timestamp};
use crate::records::{MeasurementRecord, Normalizer};
use crate::session::{summarize, DriftScan, SessionOptions};
use crate::sky::{decimal_year, next_transit, rise_and_set, AzEl, Observer};
use crate::station::{Station, StationPreset};

#[derive(Parser)]
#[command(name = "pointcal")]
#[command(about = "Radio telescope pointing calibration")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Station preset, overriding the configuration file
    #[arg(long, global = true, value_enum)]
    station: Option<StationPreset>,
    /// Station position as "lat,lon" in degrees, overriding --station
    #[arg(long, global = true, allow_hyphen_values = true)]
    coordinates: Option<String>,
    /// Station elevation [m], used with --coordinates
    #[arg(long, global = true)]
    elevation: Option<f64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the source catalog
    Sources {
        /// Also show predicted flux densities at this frequency
        #[arg(long)]
        freq_mhz: Option<f64>,
    },
    /// Fit a pointing-correction rotation to pointing-results files
    FitRotation {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Evaluate candidates on a single thread
        #[arg(long)]
        serial: bool,
        /// Worker threads (0 for all cores)
        #[arg(long)]
        workers: Option<usize>,
        /// Stop at the first malformed row instead of skipping it
        #[arg(long)]
        strict: bool,
        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fit a single drift scan
    Drift {
        file: PathBuf,
        /// Include a linear baseline term
        #[arg(long)]
        linear: bool,
        /// Source, to convert the FWHM to degrees
        #[arg(long)]
        source: Option<String>,
        /// Observing frequency, for an SEFD estimate with --source
        #[arg(long)]
        freq_mhz: Option<f64>,
    },
    /// Fit peak powers at several declination offsets
    DecOffset {
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        offsets: Vec<f64>,
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        powers: Vec<f64>,
        /// Beam FWHM, in the units of the offsets
        #[arg(long, default_value_t = DEFAULT_FWHM_DEG)]
        fwhm: f64,
    },
    /// Summarize the drift scans of one source into a pointing-results row
    Session {
        source: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Observing frequency, for the row and the SEFD estimate
        #[arg(long)]
        freq_mhz: Option<f64>,
        /// Centre beam pointing as "az,el" in degrees
        #[arg(long)]
        pointing: Option<String>,
        /// Remove a linear baseline before fitting
        #[arg(long)]
        linear: bool,
        #[arg(long)]
        json: bool,
    },
    /// Rise, transit and set times of a source on a UTC day
    Times {
        source: String,
        /// YYYY/MM/DD
        date: String,
        /// Extra elevations [deg]
        #[arg(long, value_delimiter = ',')]
        elevations: Vec<f64>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };
    let station = match resolve_station(&cli, &config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let catalog = match config.catalog() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error building catalog: {}", e);
            return ExitCode::FAILURE;
        }
    };
    log::debug!("Station: {}", station.name);

    match cli.command {
        Commands::Sources { freq_mhz } => sources(&catalog, freq_mhz),
        Commands::FitRotation {
            files,
            serial,
            workers,
            strict,
            json,
        } => {
            let mut search = config.search.clone();
            if serial {
                search.parallel = false;
            }
            if let Some(w) = workers {
                search.workers = w;
            }
            fit_rotation(
                &station,
                &catalog,
                &files,
                search.execution(),
                &search.levels,
                strict,
                json,
            )
        }
        Commands::Drift {
            file,
            linear,
            source,
            freq_mhz,
        } => drift(&catalog, &file, linear, source.as_deref(), freq_mhz),
        Commands::DecOffset {
            offsets,
            powers,
            fwhm,
        } => dec_offset(&offsets, &powers, fwhm),
        Commands::Session {
            source,
            files,
            freq_mhz,
            pointing,
            linear,
            json,
        } => run_session(
            &station, &catalog, &source, &files, freq_mhz, pointing, linear, json,
        ),
        Commands::Times {
            source,
            date,
            elevations,
        } => times(&station, &catalog, &source, &date, &elevations),
    }
}

fn resolve_station(cli: &Cli, config: &Config) -> Result<Station, String> {
    if let Some(coords) = &cli.coordinates {
        return Station::from_coordinates("custom", coords, cli.elevation)
            .ok_or_else(|| format!("Invalid coordinates '{}', expected \"lat,lon\"", coords));
    }
    if let Some(preset) = cli.station {
        return Ok(Station::from_preset(preset));
    }
    config
        .station()
        .map_err(|e| format!("Error in station configuration: {}", e))
}

fn find_source<'a>(catalog: &'a Catalog, name: &str) -> Option<&'a CatalogEntry> {
    match catalog.find(name) {
        Ok(entry) => Some(entry),
        Err(e) => {
            eprintln!("{}", e);
            None
        }
    }
}

/// Parse "a,b" as two floats.
fn parse_pair(s: &str) -> Option<(f64, f64)> {
    let (a, b) = s.split_once(',')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

fn sources(catalog: &Catalog, freq_mhz: Option<f64>) -> ExitCode {
    let epoch = decimal_year(Utc::now());
    println!("{:<8}  {:>11}  {:>11}  {:>10}", "Name", "RA", "Dec", "Flux [Jy]");
    println!("{}", "-".repeat(46));
    for entry in catalog.entries() {
        let pos = entry.position();
        let flux = match freq_mhz.and_then(|f| entry.flux_jy(f * 1e6, epoch)) {
            Some(jy) => format!("{:10.1}", jy),
            None if entry.supports_flux_prediction() => format!("{:>10}", "model"),
            None => format!("{:>10}", "-"),
        };
        println!(
            "{:<8}  {:>11}  {:>11}  {}",
            entry.name(),
            format_hours(pos.ra),
            format_degrees(pos.dec),
            flux
        );
    }
    println!("{} sources", catalog.len());
    ExitCode::SUCCESS
}

#[derive(Serialize)]
struct FrequencyReport {
    freq_mhz: f64,
    records: usize,
    uncorrected_rms: f64,
    levels: Vec<LevelResult>,
    raw: Option<ErrorStats>,
    corrected: Option<ErrorStats>,
}

fn print_stats(title: &str, stats: Option<&ErrorStats>) {
    let Some(stats) = stats else {
        return;
    };
    println!("{}:", title);
    println!("  Mean Error: {:.3} degrees", stats.mean);
    println!("  RMS Error:  {:.3} degrees", stats.rms);
    match stats.slope {
        Some(s) => println!("  Error Slope:   {:.3} degrees/degree", s),
        None => println!("  Error Slope:   n/a"),
    }
    match stats.r_value {
        Some(r) => println!("  Error R-Value: {:.3}", r),
        None => println!("  Error R-Value: n/a"),
    }
}

/// Records grouped by frequency, in order of first appearance.
fn group_by_frequency(records: Vec<MeasurementRecord>) -> Vec<(f64, Vec<MeasurementRecord>)> {
    let mut groups: Vec<(f64, Vec<MeasurementRecord>)> = Vec::new();
    for record in records {
        let freq = record.frequency_mhz();
        match groups.iter_mut().find(|(f, _)| *f == freq) {
            Some((_, group)) => group.push(record),
            None => groups.push((freq, vec![record])),
        }
    }
    groups
}

fn fit_rotation(
    station: &Station,
    catalog: &Catalog,
    files: &[PathBuf],
    execution: Execution,
    levels: &[correction::SearchLevel],
    strict: bool,
    json: bool,
) -> ExitCode {
    let normalizer = Normalizer::new(station, catalog);
    let mut records = Vec::new();
    for path in files {
        match normalizer.read_file(path, !strict) {
            Ok(mut r) => records.append(&mut r),
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }
    if records.is_empty() {
        eprintln!("No pointing records found");
        return ExitCode::FAILURE;
    }
    if !json {
        println!("Station: {}", station.name);
        println!();
    }

    let groups = group_by_frequency(records);
    let multiple = groups.len() > 1;
    let mut reports = Vec::with_capacity(groups.len());
    for (freq, group) in groups {
        if multiple && !json {
            println!("Working on {:.3} MHz", freq);
        }
        let data = collapse(&group);

        let start = Instant::now();
        let uncorrected_rms = rms_error(&AxisRotation, &data, 0.0, 0.0, 0.0);
        if !json {
            println!("Level 0 ({}):", format_elapsed(start.elapsed()));
            println!("  Theta: None applied");
            println!("  Phi:   None applied");
            println!("  Psi:   None applied");
            println!("  -> RMS: {:.3} degrees", uncorrected_rms);
        }

        let results = match refine(&AxisRotation, &data, levels, execution) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Rotation search failed: {}", e);
                return ExitCode::FAILURE;
            }
        };
        let Some(best) = results.last().map(|r| r.best) else {
            eprintln!("Rotation search produced no result");
            return ExitCode::FAILURE;
        };
        if !json {
            for r in &results {
                println!("Level {} ({}):", r.level, format_elapsed(r.elapsed));
                println!("  Theta: {:.1} degrees", r.best.theta);
                println!("  Phi:   {:.1} degrees", r.best.phi);
                println!("  Psi:   {:.1} degrees", r.best.psi);
                println!("  -> RMS: {:.3} degrees", r.best.rms_error);
            }
        }

        let raw = ErrorStats::from_pairs(&raw_errors(&group));
        let corrected = ErrorStats::from_pairs(&corrected_errors(&AxisRotation, &group, &best));
        if !json {
            print_stats("Raw Offsets", raw.as_ref());
            print_stats("Corrected Offsets", corrected.as_ref());
        }

        reports.push(FrequencyReport {
            freq_mhz: freq,
            records: group.len(),
            uncorrected_rms,
            levels: results,
            raw,
            corrected,
        });
    }

    if json {
        match serde_json::to_string_pretty(&reports) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Error serializing results: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn drift(
    catalog: &Catalog,
    path: &Path,
    linear: bool,
    source: Option<&str>,
    freq_mhz: Option<f64>,
) -> ExitCode {
    let scan = match DriftScan::from_file(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let entry = match source {
        Some(name) => match find_source(catalog, name) {
            Some(e) => Some(e),
            None => return ExitCode::FAILURE,
        },
        None => None,
    };

    let fit = match fit_driftscan(&scan.t, &scan.power, linear) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Drift scan fit failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Target: {}", scan.label);
    match fit.transit_datetime() {
        Some(t) => println!("  Observed Transit: {}", t.format("%Y/%m/%d %H:%M:%S%.3f")),
        None => println!("  Observed Transit: {:.3} s", fit.transit_time),
    }
    match entry {
        Some(e) => println!(
            "  FWHM: {:.2} s ({:.2} deg)",
            fit.fwhm_seconds,
            fit.fwhm_degrees(e.position().dec)
        ),
        None => println!("  FWHM: {:.2} s", fit.fwhm_seconds),
    }
    println!("  1/(P1/P0 - 1): {:.3}", fit.sefd_metric);
    let epoch = fit.transit_datetime().map_or(2000.0, decimal_year);
    if let Some(flux) = entry.zip(freq_mhz).and_then(|(e, f)| e.flux_jy(f * 1e6, epoch)) {
        println!("  SEFD: {:.0} Jy", fit.sefd_jy(flux));
    }
    if let Some(slope) = fit.slope {
        println!("  Baseline slope: {:.3e} per s", slope);
    }
    println!("  Residual RMS: {:.4}", fit.residual_rms);
    ExitCode::SUCCESS
}

fn dec_offset(offsets: &[f64], powers: &[f64], fwhm: f64) -> ExitCode {
    match fit_dec_offset(offsets, powers, fwhm) {
        Ok(fit) => {
            println!("Declination error: {:.4}", fit.dec_error);
            println!("  Height: {:.4}", fit.height);
            println!("  Offset: {:.4}", fit.offset);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Declination fit failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_session(
    station: &Station,
    catalog: &Catalog,
    source: &str,
    files: &[PathBuf],
    freq_mhz: Option<f64>,
    pointing: Option<String>,
    linear: bool,
    json: bool,
) -> ExitCode {
    let Some(entry) = find_source(catalog, source) else {
        return ExitCode::FAILURE;
    };
    let pointing = match pointing.as_deref().map(parse_pair) {
        None => None,
        Some(Some((az, el))) => Some(AzEl::new(az.to_radians(), el.to_radians())),
        Some(None) => {
            eprintln!("Invalid pointing, expected \"az,el\" in degrees");
            return ExitCode::FAILURE;
        }
    };

    let mut scans = Vec::with_capacity(files.len());
    for path in files {
        match DriftScan::from_file(path) {
            Ok(s) => scans.push(s),
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    let options = SessionOptions {
        freq_hz: freq_mhz.map(|f| f * 1e6),
        pointing,
        include_linear: linear,
    };
    let summary = match summarize(station, entry, &scans, &options) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Session summary failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if json {
        match serde_json::to_string_pretty(&summary) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Error serializing results: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    println!(
        "Expected transit: {}",
        summary.expected_transit.format("%Y/%m/%d %H:%M:%S")
    );
    for scan in &summary.scans {
        println!("Target: {}", scan.label);
        println!("  FWHM: {:.2} s ({:.2} deg)", scan.fwhm_s, scan.fwhm_deg);
        println!("  -> Difference: {:.2} s", scan.ra_offset_s);
        println!("  1/(P1/P0 - 1): {:.3}", scan.sefd_metric);
    }
    println!("Source YYYY/MM/DD HH:MM:SS MHz    Z          errRA      errDec      SEFD      FWHM");
    println!("{}", summary.to_row().to_line());
    ExitCode::SUCCESS
}

fn times(
    station: &Station,
    catalog: &Catalog,
    source: &str,
    date: &str,
    extra: &[f64],
) -> ExitCode {
    let Some(entry) = find_source(catalog, source) else {
        return ExitCode::FAILURE;
    };
    let start = match parse_record_timestamp(date, "00:00:00") {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Invalid date '{}': {}", date, e);
            return ExitCode::FAILURE;
        }
    };

    let mut elevations: Vec<f64> = vec![30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0];
    for &el in extra {
        if !elevations.contains(&el) {
            elevations.push(el);
        }
    }
    elevations.sort_by(f64::total_cmp);

    let pos = entry.position();
    let crossings: Vec<_> = elevations
        .iter()
        .map(|&el| (el, rise_and_set(station, pos, start, el.to_radians())))
        .collect();
    let observer = Observer::new(station, start);
    let describe = |t: DateTime<Utc>| {
        let (az, el) = observer.at(t).azel(pos).to_degrees();
        format!(
            "{} (el: {:4.1}, az: {:5.1})",
            t.format("%Y/%m/%d %H:%M:%S"),
            el,
            az
        )
    };

    println!("{} on {} UTC:", entry.name(), date);
    println!("  rising");
    for (el, (rise, _)) in &crossings {
        if let Some(c) = rise {
            println!("    el: {:4.1} degrees at {}", el, describe(c.time));
        }
    }
    let transit = next_transit(station, pos, start);
    let (_, transit_el) = observer.at(transit).azel(pos).to_degrees();
    println!("  transit");
    println!(
        "    el: {:4.1} degrees at {}",
        transit_el,
        transit.format("%Y/%m/%d %H:%M:%S")
    );
    println!("  setting");
    for (el, (_, set)) in crossings.iter().rev() {
        if let Some(c) = set {
            println!("    el: {:4.1} degrees at {}", el, describe(c.time));
        }
    }
    ExitCode::SUCCESS
}
