use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeSet, str::FromStr};

use crate::classify::StatusCategory;
use crate::task::Task;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Dataset (source row) order.
    #[default]
    Row,
    Status,
    Task,
    Description,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "row" => Ok(SortKey::Row),
            "status" | "status_category" => Ok(SortKey::Status),
            "task" => Ok(SortKey::Task),
            "description" => Ok(SortKey::Description),
            other => Err(format!(
                "invalid sort key '{other}'. Valid options are: row, status, task, description"
            )),
        }
    }
}

/// What the viewer asked to see. Re-applied to whichever dataset is current.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewState {
    pub categories: BTreeSet<StatusCategory>,
    pub search: String,
    pub sort: SortKey,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            categories: StatusCategory::ALL.into_iter().collect(),
            search: String::new(),
            sort: SortKey::Row,
        }
    }
}

pub fn view(tasks: &[Task], state: &ViewState) -> Vec<Task> {
    let needle = state.search.to_lowercase();
    let searching = !needle.trim().is_empty();

    let mut out: Vec<Task> = tasks
        .iter()
        .filter(|t| state.categories.contains(&t.status_category))
        .filter(|t| !searching || matches_search(t, &needle))
        .cloned()
        .collect();

    // `sort_by` is stable, so equal keys keep dataset order.
    match state.sort {
        SortKey::Row => {}
        SortKey::Status => out.sort_by_key(|t| t.status_category),
        SortKey::Task => out.sort_by(|a, b| cmp_text(&a.task, &b.task)),
        SortKey::Description => out.sort_by(|a, b| cmp_text(&a.description, &b.description)),
    }
    out
}

/// The records handed to an export formatter, in view order.
pub fn exportable(view: &[Task]) -> Vec<Task> {
    view.to_vec()
}

fn matches_search(task: &Task, needle: &str) -> bool {
    task.task.to_lowercase().contains(needle) || task.description.to_lowercase().contains(needle)
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Vec<Task> {
        vec![
            Task::new(Some("beta"), Some("Write the API"), Some("In Progress")),
            Task::new(Some("Alpha"), Some("ship docs"), Some("Completed")),
            Task::new(Some("gamma"), None, None),
            Task::new(Some("alpha"), Some("api review"), Some("todo")),
            Task::new(None, Some("cleanup"), Some("Blocked")),
        ]
    }

    fn names(v: &[Task]) -> Vec<&str> {
        v.iter().map(|t| t.task.as_str()).collect()
    }

    fn state(categories: &[StatusCategory], search: &str, sort: SortKey) -> ViewState {
        ViewState {
            categories: categories.iter().copied().collect(),
            search: search.to_string(),
            sort,
        }
    }

    #[test]
    fn all_categories_and_no_search_keeps_every_task() {
        let ds = dataset();
        for sort in [SortKey::Row, SortKey::Status, SortKey::Task, SortKey::Description] {
            let v = view(&ds, &state(&StatusCategory::ALL, "", sort));
            let mut got = names(&v);
            let mut want = names(&ds);
            got.sort();
            want.sort();
            assert_eq!(got, want, "{sort:?}");
        }
        assert_eq!(view(&ds, &ViewState::default()), ds);
    }

    #[test]
    fn empty_selection_is_empty_view() {
        let ds = dataset();
        assert!(view(&ds, &state(&[], "", SortKey::Row)).is_empty());
        assert!(view(&ds, &state(&[], "alpha", SortKey::Task)).is_empty());
    }

    #[test]
    fn category_filter_then_search() {
        let ds = dataset();
        let v = view(
            &ds,
            &state(
                &[StatusCategory::InProgress, StatusCategory::ToDo],
                "API",
                SortKey::Row,
            ),
        );
        assert_eq!(names(&v), vec!["beta", "alpha"]);

        let v = view(&ds, &state(&[StatusCategory::Completed], "api", SortKey::Row));
        assert!(v.is_empty());
    }

    #[test]
    fn search_covers_sentinels() {
        let ds = dataset();
        let v = view(&ds, &state(&StatusCategory::ALL, "untitled", SortKey::Row));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].description, "cleanup");

        let v = view(&ds, &state(&StatusCategory::ALL, "no description", SortKey::Row));
        assert_eq!(names(&v), vec!["gamma"]);
    }

    #[test]
    fn whitespace_search_is_noop() {
        let ds = dataset();
        assert_eq!(view(&ds, &state(&StatusCategory::ALL, "   ", SortKey::Row)).len(), 5);
    }

    #[test]
    fn surrounding_whitespace_in_query_is_significant() {
        let ds = dataset();
        let v = view(&ds, &state(&StatusCategory::ALL, " api", SortKey::Row));
        assert_eq!(names(&v), vec!["beta"]);

        let v = view(&ds, &state(&StatusCategory::ALL, "api", SortKey::Row));
        assert_eq!(names(&v), vec!["beta", "alpha"]);
    }

    #[test]
    fn sort_by_task_is_stable_and_case_insensitive() {
        let ds = dataset();
        let v = view(&ds, &state(&StatusCategory::ALL, "", SortKey::Task));
        assert_eq!(
            names(&v),
            vec!["Alpha", "alpha", "beta", "gamma", "Untitled Task"]
        );
    }

    #[test]
    fn sort_by_status_uses_precedence_order() {
        let ds = dataset();
        let v = view(&ds, &state(&StatusCategory::ALL, "", SortKey::Status));
        // gamma (absent) precedes Untitled (Blocked): both pending, dataset order.
        assert_eq!(
            names(&v),
            vec!["Alpha", "beta", "alpha", "gamma", "Untitled Task"]
        );
    }

    #[test]
    fn source_is_not_mutated() {
        let ds = dataset();
        let before = ds.clone();
        let _ = view(&ds, &state(&[StatusCategory::Pending], "x", SortKey::Description));
        assert_eq!(ds, before);
    }

    #[test]
    fn exportable_preserves_view_order() {
        let ds = dataset();
        let v = view(&ds, &state(&StatusCategory::ALL, "", SortKey::Description));
        assert_eq!(exportable(&v), v);
    }

    #[test]
    fn parses_sort_keys() {
        assert_eq!("".parse(), Ok(SortKey::Row));
        assert_eq!("Task".parse(), Ok(SortKey::Task));
        assert_eq!("status".parse(), Ok(SortKey::Status));
        assert!("priority".parse::<SortKey>().is_err());
    }
}
