//! Response table export.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::answers::AnswerStore;
use crate::error::PersistenceError;
use crate::ids::{PARTICIPANT_COLUMN, TIMER_COLUMN};

/// One participant's row with the stable column set of the experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTable {
    pub header: Vec<String>,
    pub row: Vec<String>,
}

impl ResponseTable {
    /// Builds the row from finalized records only.
    pub fn from_store(store: &AnswerStore) -> Result<Self, PersistenceError> {
        let participant = store
            .participant()
            .ok_or(PersistenceError::MissingParticipant)?;

        let mut header = Vec::with_capacity(store.columns().len() + 2);
        header.push(PARTICIPANT_COLUMN.to_string());
        header.extend(store.columns().iter().cloned());
        header.push(TIMER_COLUMN.to_string());

        let mut row = Vec::with_capacity(header.len());
        row.push(participant.to_string());
        row.extend(store.finalized_cells());
        row.push(
            store
                .elapsed_time()
                .map(|elapsed| format!("{:.3}", elapsed.as_secs_f64()))
                .unwrap_or_default(),
        );

        Ok(Self { header, row })
    }

    pub fn participant(&self) -> &str {
        self.row.first().map(String::as_str).unwrap_or_default()
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for line in [&self.header, &self.row] {
            let cells: Vec<String> = line.iter().map(|cell| csv_cell(cell)).collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }
}

fn csv_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Destination of finished response tables.
pub trait ResponseSink {
    /// Writes the table and returns where it went.
    fn persist(&mut self, table: &ResponseTable) -> Result<PathBuf, PersistenceError>;
}

/// Writes `<dir>/<participant>.csv`, never replacing an existing file.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    dir: PathBuf,
}

impl CsvFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ResponseSink for CsvFileSink {
    fn persist(&mut self, table: &ResponseTable) -> Result<PathBuf, PersistenceError> {
        let write_error = |path: &Path, source: io::Error| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(|err| write_error(&self.dir, err))?;

        let stem = sanitize(table.participant());
        let mut attempt = 1;
        loop {
            let name = if attempt == 1 {
                format!("{stem}.csv")
            } else {
                format!("{stem}_{attempt}.csv")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    write_or_discard(&path, &mut file, table.to_csv().as_bytes())
                        .map_err(|err| write_error(&path, err))?;
                    return Ok(path);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => return Err(write_error(&path, err)),
            }
        }
    }
}

/// Removes the freshly created file when the write fails.
fn write_or_discard(path: &Path, file: &mut impl Write, bytes: &[u8]) -> io::Result<()> {
    let written = file.write_all(bytes).and_then(|_| file.flush());
    if written.is_err()
        && let Err(err) = fs::remove_file(path)
    {
        warn!(path = %path.display(), %err, "cannot remove partial response file");
    }
    written
}

/// Keeps participant ids usable as file names.
fn sanitize(participant: &str) -> String {
    let cleaned: String = participant
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "participant".to_string()
    } else {
        cleaned
    }
}

/// Persists with one retry; the table stays with the caller on failure.
pub fn persist_with_retry(
    sink: &mut dyn ResponseSink,
    table: &ResponseTable,
) -> Result<PathBuf, PersistenceError> {
    match sink.persist(table) {
        Ok(path) => {
            info!(path = %path.display(), "responses written");
            Ok(path)
        }
        Err(first) => {
            warn!(error = %first, "writing responses failed, retrying once");
            let path = sink.persist(table)?;
            info!(path = %path.display(), "responses written on retry");
            Ok(path)
        }
    }
}
