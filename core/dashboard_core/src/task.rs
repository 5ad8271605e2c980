use serde::Serialize;

use crate::classify::{classify, StatusCategory};

pub const UNTITLED_TASK: &str = "Untitled Task";
pub const NO_DESCRIPTION: &str = "No description provided";

const TASK_COLUMN: &str = "Task";
const DESCRIPTION_COLUMN: &str = "Description";
const STATUS_COLUMN: &str = "Status";

/// One source row: cells in source column order. `None` marks an absent cell.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<(String, Option<String>)>,
}

impl RawRow {
    pub fn new(cells: Vec<(String, Option<String>)>) -> Self {
        Self { cells }
    }

    /// Exact header match first, then trimmed case-insensitive.
    pub fn get(&self, column: &str) -> Option<&str> {
        let cell = self
            .cells
            .iter()
            .find(|(name, _)| name == column)
            .or_else(|| {
                self.cells
                    .iter()
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case(column))
            })?;
        cell.1.as_deref()
    }

    /// True when every cell is absent.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.is_none())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, Option<V>)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.map(Into::into)))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Task {
    pub task: String,
    pub description: String,
    pub status_raw: Option<String>,
    pub status_category: StatusCategory,
}

impl Task {
    pub fn new(task: Option<&str>, description: Option<&str>, status_raw: Option<&str>) -> Self {
        Self {
            task: task.unwrap_or(UNTITLED_TASK).to_string(),
            description: description.unwrap_or(NO_DESCRIPTION).to_string(),
            status_raw: status_raw.map(str::to_string),
            status_category: classify(status_raw),
        }
    }

    /// Text shown on the status badge.
    pub fn status_label(&self) -> &str {
        self.status_raw
            .as_deref()
            .unwrap_or(StatusCategory::Pending.label())
    }
}

pub fn normalize(row: &RawRow) -> Task {
    Task::new(
        row.get(TASK_COLUMN),
        row.get(DESCRIPTION_COLUMN),
        row.get(STATUS_COLUMN),
    )
}

pub fn normalize_rows(rows: &[RawRow]) -> Vec<Task> {
    rows.iter().map(normalize).collect()
}
