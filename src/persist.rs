//! Board ↔ JSON save file.
//!
//! The file is a snapshot: read once at startup, rewritten on save.
//! Never consulted in between; the Board is the runtime truth.

use crate::board::{Board, BoardError, Category, TaskFields, TaskRecord};
use crate::clock::Clock;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
#[cfg(feature = "profile")]
use std::time::Instant;
use tracing::{debug, info, instrument};

pub const DEFAULT_TASKS_FILE: &str = "tasks.json";

// ── On-disk task shape ─────────────────────────────────────────

/// `{ "name", "details", "due_date": "yyyy-MM-dd", "labels", "completed" }`
#[derive(Debug, Serialize)]
struct StoredTask<'a> {
    name: &'a str,
    details: &'a str,
    due_date: NaiveDate,
    labels: &'a [String],
    completed: bool,
}

impl<'a> From<&'a TaskRecord> for StoredTask<'a> {
    fn from(task: &'a TaskRecord) -> Self {
        StoredTask {
            name: &task.name,
            details: &task.details,
            due_date: task.due_date,
            labels: &task.labels,
            completed: task.completed,
        }
    }
}

/// Read side. Everything but the name is optional; older files wrote the
/// name as `"text"` and had no details or labels.
#[derive(Debug, Deserialize)]
struct LoadedTask {
    #[serde(alias = "text")]
    name: String,
    #[serde(default)]
    details: String,
    #[serde(default)]
    due_date: Option<NaiveDate>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    completed: bool,
}

impl LoadedTask {
    fn into_record(self, today: NaiveDate) -> Result<TaskRecord, BoardError> {
        let fields = TaskFields::named(self.name, self.due_date.unwrap_or(today))
            .with_details(self.details)
            .with_labels(self.labels);
        let mut record = TaskRecord::from_fields(fields)?;
        record.completed = self.completed;
        Ok(record)
    }
}

// ── Save file ──────────────────────────────────────────────────

/// Handle to the tasks file. Holds only the path; every call hits the disk.
#[derive(Debug, Clone)]
pub struct TaskFile {
    path: PathBuf,
}

impl TaskFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TaskFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rebuild a board with the given categories from disk.
    ///
    /// A missing file is an empty board, not an error. Keys for categories
    /// the board doesn't have are ignored; absent keys leave that list empty.
    /// Missing optional fields get defaults, with `due_date` falling back to
    /// the clock's today.
    #[instrument(name = "load", skip_all, fields(path = %self.path.display()))]
    pub fn load_board(&self, categories: &[Category], clock: &dyn Clock) -> Result<Board, SaveFileError> {
        #[cfg(feature = "profile")]
        let start = Instant::now();

        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("no tasks file yet, starting empty");
                return Ok(Board::new(categories));
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let doc: Value = serde_json::from_str(&text)
            .map_err(|e| SaveFileError::Parse(e.to_string()))?;
        let Value::Object(doc) = doc else {
            return Err(SaveFileError::Parse("top level is not an object".into()));
        };

        let today = clock.today();
        let mut board = Board::new(categories);

        for category in board.categories().collect::<Vec<_>>() {
            let Some(value) = doc.get(category.as_str()) else {
                continue;
            };

            let loaded = Vec::<LoadedTask>::deserialize(value)
                .map_err(|e| SaveFileError::Parse(format!("{category}: {e}")))?;

            let tasks = loaded
                .into_iter()
                .enumerate()
                .map(|(index, task)| {
                    task.into_record(today)
                        .map_err(|e| SaveFileError::Parse(format!("{category}[{index}]: {e}")))
                })
                .collect::<Result<Vec<_>, _>>()?;

            board.restore(category, tasks);
        }

        for key in doc.keys() {
            if !board.categories().any(|c| c.as_str() == key) {
                debug!(key = %key, "ignoring unknown category in tasks file");
            }
        }

        #[cfg(feature = "profile")]
        debug!(elapsed_us = start.elapsed().as_micros() as u64, "load parsed tasks file");

        info!(tasks = board.len(), "tasks loaded");
        Ok(board)
    }

    /// Overwrite the file with the full board. Every category the board has
    /// is written, empty ones included.
    #[instrument(name = "save", skip_all, fields(path = %self.path.display()))]
    pub fn save_board(&self, board: &Board) -> Result<(), SaveFileError> {
        #[cfg(feature = "profile")]
        let start = Instant::now();

        let doc: BTreeMap<&str, Vec<StoredTask<'_>>> = board
            .categories()
            .map(|c| (c.as_str(), board.tasks(c).iter().map(StoredTask::from).collect()))
            .collect();

        let mut bytes = serde_json::to_vec_pretty(&doc)
            .map_err(|e| SaveFileError::Encode(e.to_string()))?;
        bytes.push(b'\n');

        fs::write(&self.path, bytes).map_err(|e| self.io_error(e))?;

        #[cfg(feature = "profile")]
        debug!(elapsed_us = start.elapsed().as_micros() as u64, "save wrote tasks file");

        info!(tasks = board.len(), revision = board.revision, "tasks saved");
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> SaveFileError {
        SaveFileError::Io { path: self.path.clone(), source }
    }
}

// ── Errors ─────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum SaveFileError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse: {0}")]
    Parse(String),
    #[error("encode: {0}")]
    Encode(String),
}

// ── Tests ──────────────────────────────────────────────────────
