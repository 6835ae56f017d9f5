//! Timestamp decoding for time coordinates.
//!
//! Two encodings occur in practice:
//! - WRF style character matrices (`Times(Time, DateStrLen)`), one
//!   `2023-01-01_00:00:00` string per row
//! - numeric offsets, either CF encoded (`hours since 2023-01-01`) or bare
//!   numbers relative to a base timestamp found elsewhere
//!
//! The base for bare numbers is taken from the CF `units` attribute first,
//! then from a global attribute, then from a fixed fallback epoch.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Output format of every time label.
pub const LABEL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const INPUT_FORMATS: [&str; 3] = ["%Y-%m-%d_%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Unit of a numeric time offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn seconds(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Hours => 3_600.0,
            TimeUnit::Days => 86_400.0,
        }
    }

    /// Parse a CF unit word (`hours`, `hour`, `hrs`, `s`, ...).
    pub fn parse(word: &str) -> Option<Self> {
        match word.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => Some(TimeUnit::Seconds),
            "min" | "mins" | "minute" | "minutes" => Some(TimeUnit::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" => Some(TimeUnit::Hours),
            "d" | "day" | "days" => Some(TimeUnit::Days),
            _ => None,
        }
    }
}

/// Parse a single timestamp string in any of the accepted layouts.
///
/// Trailing NUL padding, whitespace and a `Z`/`UTC` suffix are ignored. A
/// bare date is read as midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim_end_matches('\0').trim();
    let s = s
        .strip_suffix("UTC")
        .or_else(|| s.strip_suffix('Z'))
        .unwrap_or(s)
        .trim();

    INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Decode a character matrix of `rows` timestamps, `width` bytes each.
pub fn decode_char_times(bytes: &[u8], rows: usize, width: usize) -> Result<Vec<NaiveDateTime>, String> {
    if rows * width != bytes.len() {
        return Err(format!(
            "{} bytes cannot hold {} timestamps of width {}",
            bytes.len(),
            rows,
            width
        ));
    }

    (0..rows)
        .map(|row| {
            let text = String::from_utf8_lossy(&bytes[row * width..(row + 1) * width]);
            parse_timestamp(&text).ok_or_else(|| format!("unparseable timestamp '{}'", text.trim_end_matches('\0')))
        })
        .collect()
}

/// Split a CF units string (`<unit> since <datetime>`).
///
/// Returns the unit and, if present and parseable, the base timestamp. A
/// string that is only a unit word (`hours`) yields no base.
pub fn parse_cf_units(units: &str) -> Option<(TimeUnit, Option<NaiveDateTime>)> {
    let mut parts = units.splitn(2, " since ");
    let unit = TimeUnit::parse(parts.next()?)?;
    let base = parts.next().and_then(parse_timestamp);
    Some((unit, base))
}

/// Shift `base` by `offset` units. Non-finite offsets yield `None`.
pub fn offset_to_datetime(base: NaiveDateTime, offset: f64, unit: TimeUnit) -> Option<NaiveDateTime> {
    if !offset.is_finite() {
        return None;
    }
    let millis = (offset * unit.seconds() * 1_000.0).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    base.checked_add_signed(Duration::milliseconds(millis as i64))
}

/// Format a timestamp as a time label.
pub fn format_label(dt: &NaiveDateTime) -> String {
    dt.format(LABEL_FORMAT).to_string()
}
