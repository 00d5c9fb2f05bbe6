use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y", "%m/%d/%y"];

/// Spreadsheet serial day numbers count from this date.
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Parses the date-like values found in feed exports. Anything unreadable yields `None`;
/// time-of-day is dropped because every comparison downstream is per calendar day.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return plausible(dt.date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return plausible(dt.date());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            if let Some(date) = plausible(date) {
                return Some(date);
            }
        }
    }

    trimmed
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .and_then(date_from_number)
}

fn date_from_number(number: f64) -> Option<NaiveDate> {
    let date = if number >= 1e11 {
        DateTime::from_timestamp_millis(number as i64)?.date_naive()
    } else if number >= 1e9 {
        DateTime::from_timestamp(number as i64, 0)?.date_naive()
    } else if (1.0..=100_000.0).contains(&number) {
        let (year, month, day) = SERIAL_EPOCH;
        NaiveDate::from_ymd_opt(year, month, day)?
            .checked_add_signed(Duration::days(number.trunc() as i64))?
    } else {
        return None;
    };
    plausible(date)
}

fn plausible(date: NaiveDate) -> Option<NaiveDate> {
    use chrono::Datelike;
    (1900..=2200).contains(&date.year()).then_some(date)
}

/// Reads currency- and separator-decorated numbers such as `$1,250.00` or `(35)`.
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (negative, body) = match trimmed
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%' | ' ' | '\u{a0}' | '\u{20ac}' | '\u{a3}'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let number = cleaned.parse::<f64>().ok().filter(|n| n.is_finite())?;
    Some(if negative { -number } else { number })
}

/// Percent values arrive both as fractions (`0.952`) and as points (`95.2`, `95.2%`).
/// The result is always in percentage points.
pub fn parse_percent(value: &str) -> Option<f64> {
    let number = parse_number(value)?;
    if !value.contains('%') && number.abs() <= 1.0 {
        Some(number * 100.0)
    } else {
        Some(number)
    }
}

/// Counts are stored as text in most exports; fractional or negative values are rounded
/// and floored at zero.
pub fn parse_count(value: &str) -> Option<u32> {
    let number = parse_number(value)?;
    Some(number.round().clamp(0.0, u32::MAX as f64) as u32)
}

/// Canonical comparison key for a property name: stray markers stripped, whitespace
/// collapsed, upper-cased.
pub fn canonicalize_property(name: &str) -> String {
    let cleaned = name.replace(['*', '\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_uppercase()
}

/// Unit numbers and floor plans are compared with punctuation and spacing removed so
/// `A-101`, `a101` and `#A 101` land on the same unit.
pub fn normalize_unit_token(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Lower-cased, whitespace-collapsed copy of free text used for substring matching.
pub fn fold_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
