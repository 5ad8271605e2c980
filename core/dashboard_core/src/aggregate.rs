use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::classify::StatusCategory;
use crate::task::Task;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CategoryCounts {
    pub completed: usize,
    pub in_progress: usize,
    pub todo: usize,
    pub pending: usize,
}

impl CategoryCounts {
    pub fn get(&self, category: StatusCategory) -> usize {
        match category {
            StatusCategory::Completed => self.completed,
            StatusCategory::InProgress => self.in_progress,
            StatusCategory::ToDo => self.todo,
            StatusCategory::Pending => self.pending,
        }
    }

    fn bump(&mut self, category: StatusCategory) {
        match category {
            StatusCategory::Completed => self.completed += 1,
            StatusCategory::InProgress => self.in_progress += 1,
            StatusCategory::ToDo => self.todo += 1,
            StatusCategory::Pending => self.pending += 1,
        }
    }

    pub fn sum(&self) -> usize {
        self.completed + self.in_progress + self.todo + self.pending
    }

    fn max(&self) -> usize {
        StatusCategory::ALL
            .iter()
            .map(|c| self.get(*c))
            .max()
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusValueCount {
    pub status: String,
    pub count: usize,
}

/// Whole-dataset statistics. Rebuilt from scratch for every dataset snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    pub total: usize,
    pub counts: CategoryCounts,
    pub completion_percentage: f64,
    pub productivity_score: f64,
    pub velocity: f64,
    pub balance_score: f64,
    pub active_tasks: usize,
    pub avg_per_status: f64,
    /// Raw status cell value counts (absent cells excluded), most frequent first.
    pub status_values: Vec<StatusValueCount>,
}

pub fn aggregate(tasks: &[Task]) -> AggregateSnapshot {
    let total = tasks.len();

    let mut counts = CategoryCounts::default();
    for t in tasks {
        counts.bump(t.status_category);
    }
    debug_assert_eq!(counts.sum(), total);

    let completed = counts.completed as f64;
    let denom = total.max(1) as f64;

    let completion_percentage = if total == 0 {
        0.0
    } else {
        100.0 * completed / total as f64
    };
    let productivity_score = (completion_percentage + 50.0 * completed / denom).min(100.0);

    let distinct_categories = StatusCategory::ALL
        .iter()
        .filter(|c| counts.get(**c) > 0)
        .count();
    let velocity = if distinct_categories == 0 {
        0.0
    } else {
        completed / distinct_categories as f64
    };

    let balance_score = 100.0 * (1.0 - counts.max() as f64 / denom);

    let distinct_raw: HashSet<Option<&str>> =
        tasks.iter().map(|t| t.status_raw.as_deref()).collect();
    let avg_per_status = if distinct_raw.is_empty() {
        0.0
    } else {
        total as f64 / distinct_raw.len() as f64
    };

    AggregateSnapshot {
        total,
        active_tasks: counts.in_progress + counts.todo,
        counts,
        completion_percentage,
        productivity_score,
        velocity,
        balance_score,
        avg_per_status,
        status_values: status_value_counts(tasks),
    }
}

fn status_value_counts(tasks: &[Task]) -> Vec<StatusValueCount> {
    // value -> (count, first row index)
    let mut by_value: HashMap<&str, (usize, usize)> = HashMap::new();
    for (i, t) in tasks.iter().enumerate() {
        if let Some(raw) = t.status_raw.as_deref() {
            by_value.entry(raw).or_insert((0, i)).0 += 1;
        }
    }

    let mut out: Vec<(&str, usize, usize)> = by_value
        .into_iter()
        .map(|(status, (count, first))| (status, count, first))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    out.into_iter()
        .map(|(status, count, _)| StatusValueCount {
            status: status.to_string(),
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks(statuses: &[Option<&str>]) -> Vec<Task> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, s)| Task::new(Some(&format!("T{i}")), None, *s))
            .collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn three_row_example() {
        let ds = tasks(&[Some("Completed"), Some("In Progress"), Some("")]);
        let s = aggregate(&ds);
        assert_eq!(s.total, 3);
        assert_eq!(s.counts.completed, 1);
        assert_eq!(s.counts.in_progress, 1);
        assert_eq!(s.counts.todo, 0);
        assert_eq!(s.counts.pending, 1);
        assert_eq!(format!("{:.1}", s.completion_percentage), "33.3");
        // 33.33 + 50 * 1/3
        assert!(close(s.productivity_score, 100.0 / 3.0 + 50.0 / 3.0));
        // three categories observed
        assert!(close(s.velocity, 1.0 / 3.0));
        assert!(close(s.balance_score, 100.0 * (1.0 - 1.0 / 3.0)));
        assert_eq!(s.active_tasks, 1);
    }

    #[test]
    fn empty_dataset_is_all_zero() {
        let s = aggregate(&[]);
        assert_eq!(s.total, 0);
        assert_eq!(s.counts.sum(), 0);
        assert_eq!(s.completion_percentage, 0.0);
        assert_eq!(s.productivity_score, 0.0);
        assert_eq!(s.velocity, 0.0);
        assert_eq!(s.balance_score, 100.0);
        assert_eq!(s.avg_per_status, 0.0);
        assert!(s.status_values.is_empty());
    }

    #[test]
    fn productivity_is_capped() {
        let ds = tasks(&[Some("complete"), Some("Completed")]);
        let s = aggregate(&ds);
        assert_eq!(s.completion_percentage, 100.0);
        assert_eq!(s.productivity_score, 100.0);
        assert!(close(s.velocity, 2.0));
        assert_eq!(s.balance_score, 0.0);
    }

    #[test]
    fn closure_and_pending_cross_check() {
        let samples: Vec<Vec<Option<&str>>> = vec![
            vec![],
            vec![None],
            vec![Some("Blocked"), Some("On Hold"), None, Some("")],
            vec![Some("todo"), Some("to do"), Some("in progress"), Some("done")],
            vec![
                Some("Completed - in progress review"),
                Some("PROGRESS"),
                Some("Todo / progress"),
                Some("complete todo"),
                Some("???"),
            ],
        ];
        for statuses in samples {
            let s = aggregate(&tasks(&statuses));
            let c = &s.counts;
            assert_eq!(c.sum(), s.total);
            assert_eq!(c.pending, s.total - c.completed - c.in_progress - c.todo);
        }
    }

    #[test]
    fn aggregate_is_idempotent() {
        let ds = tasks(&[Some("Completed"), None, Some("todo"), Some("Blocked")]);
        assert_eq!(aggregate(&ds), aggregate(&ds));
    }

    #[test]
    fn velocity_uses_observed_categories_only() {
        let ds = tasks(&[Some("Completed"), Some("Completed"), Some("todo")]);
        let s = aggregate(&ds);
        assert!(close(s.velocity, 1.0));
    }

    #[test]
    fn status_values_count_raw_text() {
        let ds = tasks(&[
            Some("todo"),
            Some("Done"),
            None,
            Some("Done"),
            Some("todo"),
            Some("Blocked"),
        ]);
        let s = aggregate(&ds);
        let got: Vec<_> = s
            .status_values
            .iter()
            .map(|v| (v.status.as_str(), v.count))
            .collect();
        assert_eq!(got, vec![("todo", 2), ("Done", 2), ("Blocked", 1)]);
        // four distinct raw values including the absent one
        assert!(close(s.avg_per_status, 6.0 / 4.0));
    }
}
