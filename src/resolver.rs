//! Turns command-line input into the ordered list of stream keys.
//!
//! Exactly one source is allowed: a single literal key, or a CSV file whose
//! first column holds one key per record. Anything else is a configuration
//! error raised before any encoder is started.

use std::path::{Path, PathBuf};

use keeper_common::{Error, Result, StreamKey};

/// Where the stream keys come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// A single key given on the command line.
    Literal(String),
    /// A headerless CSV file; the first field of every record is a key.
    Csv(PathBuf),
}

impl KeySource {
    /// Pick the source from the two optional inputs.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when both or neither are supplied.
    pub fn from_options(key: Option<String>, csv: Option<PathBuf>) -> Result<Self> {
        match (key, csv) {
            (Some(_), Some(_)) => Err(Error::config("cannot specify both key and csv")),
            (None, None) => Err(Error::config("must specify either key or csv")),
            (Some(key), None) => Ok(Self::Literal(key)),
            (None, Some(path)) => Ok(Self::Csv(path)),
        }
    }

    /// Produce the keys in input order, without deduplication.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the file cannot be read or parsed, if any key is
    /// blank, or if no keys were found.
    pub fn resolve(&self) -> Result<Vec<StreamKey>> {
        let keys = match self {
            Self::Literal(raw) => vec![StreamKey::new(raw.as_str())
                .map_err(|e| Error::config(format!("invalid stream key: {e}")))?],
            Self::Csv(path) => read_csv_keys(path)?,
        };

        if keys.is_empty() {
            return Err(Error::config("no stream keys supplied"));
        }

        Ok(keys)
    }
}

/// Read the first field of every record.
///
/// Records must all have the same number of fields; a ragged file is treated
/// as malformed.
fn read_csv_keys(path: &Path) -> Result<Vec<StreamKey>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| Error::config(format!("error opening CSV file {:?}: {e}", path)))?;

    let mut keys = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| Error::config(format!("error reading CSV file {:?}: {e}", path)))?;
        let first = record.get(0).unwrap_or_default();
        let key = StreamKey::new(first).map_err(|_| {
            Error::config(format!(
                "error reading CSV file {:?}: record {} has an empty stream key",
                path,
                index + 1
            ))
        })?;
        keys.push(key);
    }

    Ok(keys)
}
