use chrono::{DateTime, NaiveDateTime, Utc};
use std::f64::consts::PI;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParsingError {
    #[error("invalid angle: {0}")]
    Angle(String),
    #[error("invalid timestamp: {0}")]
    Timestamp(String),
}

/// Parse "A:B:C" (or "A:B", or a plain decimal) into A + B/60 + C/3600.
/// A leading minus applies to the whole value.
pub fn parse_sexagesimal(s: &str) -> Result<f64, ParsingError> {
    let s = s.trim();
    let err = || ParsingError::Angle(s.to_string());
    let (neg, rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if rest.is_empty() {
        return Err(err());
    }

    let mut value = 0.0;
    let mut scale = 1.0;
    for (i, part) in rest.split(':').enumerate() {
        if i > 2 {
            return Err(err());
        }
        let v: f64 = if part.is_empty() {
            0.0
        } else {
            part.parse().map_err(|_| err())?
        };
        if !v.is_finite() || v < 0.0 {
            return Err(err());
        }
        value += v / scale;
        scale *= 60.0;
    }

    Ok(if neg { -value } else { value })
}

/// Hours (sexagesimal or decimal) to radians.
pub fn parse_hours(s: &str) -> Result<f64, ParsingError> {
    parse_sexagesimal(s).map(|h| h * PI / 12.0)
}

/// Degrees (sexagesimal or decimal) to radians.
pub fn parse_degrees(s: &str) -> Result<f64, ParsingError> {
    parse_sexagesimal(s).map(f64::to_radians)
}

/// Render a value as "A:MM:SS.s" with `decimals` digits on the seconds.
pub fn format_sexagesimal(value: f64, decimals: usize) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let factor = 10f64.powi(decimals as i32);
    // Work in whole units of the last printed digit so rounding carries.
    let total = (value.abs() * 3600.0 * factor).round() as u64;
    let per_second = factor as u64;
    let whole = total / (3600 * per_second);
    let minutes = (total / (60 * per_second)) % 60;
    let seconds = (total % (60 * per_second)) as f64 / factor;
    let width = if decimals > 0 { decimals + 3 } else { 2 };
    format!(
        "{}{}:{:02}:{:0width$.prec$}",
        sign,
        whole,
        minutes,
        seconds,
        width = width,
        prec = decimals
    )
}

pub fn format_hours(rad: f64) -> String {
    format_sexagesimal(rad * 12.0 / PI, 2)
}

pub fn format_degrees(rad: f64) -> String {
    format_sexagesimal(rad.to_degrees(), 1)
}

/// Build a UTC timestamp from record date and time fields. Dates may use '-'
/// or '/' separators; sub-second digits are dropped.
pub fn parse_record_timestamp(date: &str, time: &str) -> Result<DateTime<Utc>, ParsingError> {
    let date = date.trim().replace('-', "/");
    let time = time.trim();
    let time = time.split_once('.').map(|(t, _)| t).unwrap_or(time);
    let text = format!("{} {}", date, time);
    NaiveDateTime::parse_from_str(&text, "%Y/%m/%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| ParsingError::Timestamp(text))
}
