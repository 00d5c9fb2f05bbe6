use super::{DatasetKind, FeedSet};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum FeedLoadError {
    #[error("failed to read dataset file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid CSV in {}: {source}", .path.display())]
    Csv { path: PathBuf, source: csv::Error },
    #[error("unknown dataset key '{key}' (expected one of: {expected})")]
    UnknownDataset { key: String, expected: String },
    #[error("sync payload must be a JSON object keyed by dataset")]
    InvalidPayload,
}

/// Reads one dataset file. `.csv` files are read with their header row as field names;
/// anything else is parsed as JSON holding an array of rows or a single row object.
pub fn load_dataset_file(path: &Path) -> Result<Vec<Value>, FeedLoadError> {
    let file = File::open(path).map_err(|source| FeedLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    if is_csv(path) {
        parse_csv_rows(reader).map_err(|source| FeedLoadError::Csv {
            path: path.to_path_buf(),
            source,
        })
    } else {
        parse_json_rows(reader).map_err(|source| FeedLoadError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Loads `(dataset key, path)` pairs into one feed set.
pub fn load_local_datasets(sources: &[(String, PathBuf)]) -> Result<FeedSet, FeedLoadError> {
    let mut feeds = FeedSet::default();

    for (key, path) in sources {
        let kind = DatasetKind::from_key(key).ok_or_else(|| FeedLoadError::UnknownDataset {
            key: key.clone(),
            expected: DatasetKind::known_keys(),
        })?;

        let rows = load_dataset_file(path)?;
        let read = rows.len();
        let accepted = feeds.append_rows(kind, rows);
        info!(dataset = kind.key(), path = %path.display(), read, accepted, "loaded dataset");
    }

    Ok(feeds)
}

/// Loads a whole sync payload (`{"leasing": [...], "MMRData": [...], ...}`) from disk.
pub fn load_payload_file(path: &Path) -> Result<FeedSet, FeedLoadError> {
    let file = File::open(path).map_err(|source| FeedLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let payload: Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| FeedLoadError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    FeedSet::from_payload(payload)
}

pub(crate) fn parse_json_rows<R: Read>(reader: R) -> Result<Vec<Value>, serde_json::Error> {
    let value: Value = serde_json::from_reader(reader)?;
    Ok(rows_from_json(value))
}

pub(crate) fn rows_from_json(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

pub(crate) fn parse_csv_rows<R: Read>(reader: R) -> Result<Vec<Value>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, field)| (header.to_string(), Value::String(field.to_string())))
            .collect();
        rows.push(Value::Object(row));
    }

    Ok(rows)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}
