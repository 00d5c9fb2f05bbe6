use chrono::NaiveDate;
use leasing_kpi::error::AppError;
use leasing_kpi::feeds::FeedLoadError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Parses `KEY=PATH` as given to `--local`.
pub(crate) fn parse_dataset_source(raw: &str) -> Result<(String, PathBuf), String> {
    let (key, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=PATH, got '{raw}'"))?;
    let (key, path) = (key.trim(), path.trim());
    if key.is_empty() || path.is_empty() {
        return Err(format!("expected KEY=PATH, got '{raw}'"));
    }
    Ok((key.to_string(), PathBuf::from(path)))
}

/// Reads an override file such as `{"Oak Park": "Dead"}`.
pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, FeedLoadError> {
    let file = File::open(path).map_err(|source| FeedLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| FeedLoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `value` as JSON to `output`, or to stdout when no path is given.
pub(crate) fn write_json<T: Serialize>(
    value: &T,
    output: Option<&Path>,
    pretty: bool,
) -> Result<(), AppError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };

    match output {
        Some(path) => {
            let mut file = File::create(path)?;
            writeln!(file, "{rendered}")?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{rendered}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_sources_split_on_first_equals() {
        let (key, path) = parse_dataset_source("leasing=data/a=b.json").expect("valid");
        assert_eq!(key, "leasing");
        assert_eq!(path, PathBuf::from("data/a=b.json"));

        assert!(parse_dataset_source("leasing").is_err());
        assert!(parse_dataset_source("=data.json").is_err());
    }

    #[test]
    fn dates_must_be_iso() {
        assert!(parse_date("2025-09-24").is_ok());
        assert!(parse_date("09/24/2025").is_err());
    }
}
