use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::Value;

// ── DateParser ────────────────────────────────────────────────────────────────

/// Parses the date formats found in spreadsheet exports into naive
/// date-times.
pub struct DateParser;

/// Patterns tried in order after RFC 3339.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%d %B %Y", "%B %d, %Y"];

impl DateParser {
    /// Parse a cell into a date-time.
    ///
    /// * `Missing` → `Ok(None)`.
    /// * `DateTime` → passed through unchanged.
    /// * `Str` → trimmed and matched against the known formats; an empty
    ///   string counts as missing.
    /// * anything else, or a string no format accepts → `Err(())`.
    #[allow(clippy::result_unit_err)]
    pub fn parse(value: &Value) -> Result<Option<NaiveDateTime>, ()> {
        match value {
            Value::Missing => Ok(None),
            Value::DateTime(dt) => Ok(Some(*dt)),
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                Self::parse_str(trimmed).map(Some).ok_or(())
            }
            _ => Err(()),
        }
    }

    /// Parse a string, returning `None` when no known format matches.
    pub fn parse_str(s: &str) -> Option<NaiveDateTime> {
        // Offsets are dropped; the workbook dates are wall-clock values.
        let normalised = match s.strip_suffix('Z') {
            Some(stripped) => format!("{stripped}+00:00"),
            None => s.to_string(),
        };
        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.naive_local());
        }

        for fmt in DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(naive);
            }
        }

        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return date.and_hms_opt(0, 0, 0);
            }
        }

        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
