//! Append-only result store
//!
//! One line per scored task: hex fingerprint, the four scores, and the
//! configuration encoding, separated by single spaces. The store is the
//! checkpoint that lets an interrupted sweep resume without redoing work.

use crate::backtest::{Fingerprint, ScoreRecord, ScoreSet};
use rust_decimal::Decimal;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const FIELDS: usize = 6;

/// Result store errors
#[derive(Debug, Error)]
pub enum ResultStoreError {
    #[error("result store I/O on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Writing stopped partway; the first `written` records are on disk
    #[error("result store append to {path:?} failed after {written} records: {source}")]
    Append {
        path: PathBuf,
        written: usize,
        #[source]
        source: std::io::Error,
    },
    /// A persisted line cannot be trusted; resuming would corrupt rankings
    #[error("corrupt result store line {line}: {reason}: {content:?}")]
    Corrupt {
        line: usize,
        reason: &'static str,
        content: String,
    },
}

/// Result file handle
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every persisted record. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<ScoreRecord>, ResultStoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ResultStoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let records = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| parse_line(index + 1, line))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(count = records.len(), path = ?self.path, "Loaded result store");
        Ok(records)
    }

    /// Append records, creating the file and its directory on first use.
    ///
    /// Each line goes out in one write. When a write fails the error says how
    /// many records already reached the file, so a retry can skip them.
    pub fn append(&self, records: &[ScoreRecord]) -> Result<(), ResultStoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let io_error = |source| ResultStoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error)?;

        for (written, record) in records.iter().enumerate() {
            let line = format!("{}\n", format_line(record));
            file.write_all(line.as_bytes())
                .and_then(|()| file.flush())
                .map_err(|source| ResultStoreError::Append {
                    path: self.path.clone(),
                    written,
                    source,
                })?;
        }

        Ok(())
    }

    /// Records an error reports as already persisted
    pub fn written_before(error: &ResultStoreError) -> usize {
        match error {
            ResultStoreError::Append { written, .. } => *written,
            _ => 0,
        }
    }
}

/// Render one record as a store line
pub fn format_line(record: &ScoreRecord) -> String {
    let scores: Vec<String> = record
        .scores
        .values()
        .iter()
        .map(|score| score.normalize().to_string())
        .collect();
    format!("{} {} {}", record.fingerprint, scores.join(" "), record.encoding)
}

/// Parse one store line; `line` is 1-based and only used for diagnostics
pub fn parse_line(line: usize, content: &str) -> Result<ScoreRecord, ResultStoreError> {
    let corrupt = |reason| ResultStoreError::Corrupt {
        line,
        reason,
        content: content.to_string(),
    };

    let fields: Vec<&str> = content.split_whitespace().collect();
    if fields.len() != FIELDS {
        return Err(corrupt("expected six fields"));
    }

    let fingerprint: Fingerprint = fields[0].parse().map_err(|_| corrupt("bad fingerprint"))?;

    let mut values = [Decimal::ZERO; 4];
    for (value, field) in values.iter_mut().zip(&fields[1..5]) {
        *value = field.parse().map_err(|_| corrupt("bad score"))?;
    }

    Ok(ScoreRecord {
        fingerprint,
        scores: ScoreSet::from_values(values),
        encoding: fields[5].to_string(),
    })
}
