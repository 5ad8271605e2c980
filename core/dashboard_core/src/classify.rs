use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Canonical task state derived from a free-text status cell.
///
/// Declaration order is the classifier precedence and also the order used when
/// sorting a view by status.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Completed,
    InProgress,
    ToDo,
    Pending,
}

impl StatusCategory {
    pub const ALL: [StatusCategory; 4] = [
        StatusCategory::Completed,
        StatusCategory::InProgress,
        StatusCategory::ToDo,
        StatusCategory::Pending,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StatusCategory::Completed => "Completed",
            StatusCategory::InProgress => "In Progress",
            StatusCategory::ToDo => "To Do",
            StatusCategory::Pending => "Pending",
        }
    }

    pub fn badge(self) -> &'static str {
        match self {
            StatusCategory::Completed => "✅",
            StatusCategory::InProgress => "🔄",
            StatusCategory::ToDo => "📝",
            StatusCategory::Pending => "⏳",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            StatusCategory::Completed => "status-completed",
            StatusCategory::InProgress => "status-progress",
            StatusCategory::ToDo => "status-todo",
            StatusCategory::Pending => "status-pending",
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StatusCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completed" => Ok(StatusCategory::Completed),
            "in_progress" | "in progress" | "inprogress" => Ok(StatusCategory::InProgress),
            "todo" | "to_do" | "to do" => Ok(StatusCategory::ToDo),
            "pending" => Ok(StatusCategory::Pending),
            other => Err(format!(
                "invalid status category '{other}'. Valid options are: completed, in_progress, todo, pending"
            )),
        }
    }
}

/// Maps a raw status cell to its category. First matching rule wins.
pub fn classify(status_raw: Option<&str>) -> StatusCategory {
    let Some(raw) = status_raw else {
        return StatusCategory::Pending;
    };
    let s = raw.to_lowercase();
    if s.contains("completed") || s.contains("complete") {
        StatusCategory::Completed
    } else if s.contains("progress") {
        StatusCategory::InProgress
    } else if s.contains("to do") || s.contains("todo") {
        StatusCategory::ToDo
    } else {
        StatusCategory::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_empty_are_pending() {
        assert_eq!(classify(None), StatusCategory::Pending);
        assert_eq!(classify(Some("")), StatusCategory::Pending);
        assert_eq!(classify(Some("   ")), StatusCategory::Pending);
    }

    #[test]
    fn completed_wins_over_progress() {
        assert_eq!(
            classify(Some("Completed - needs review, in progress")),
            StatusCategory::Completed
        );
        assert_eq!(
            classify(Some("in progress, almost complete")),
            StatusCategory::Completed
        );
        assert_eq!(classify(Some("progress on todo list")), StatusCategory::InProgress);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(classify(Some("COMPLETE")), StatusCategory::Completed);
        assert_eq!(classify(Some("In Progress")), StatusCategory::InProgress);
        assert_eq!(classify(Some("TO DO")), StatusCategory::ToDo);
        assert_eq!(classify(Some("ToDo")), StatusCategory::ToDo);
    }

    #[test]
    fn unrecognized_values_fall_through_to_pending() {
        for s in ["Blocked", "On Hold", "Done", "Waiting", "to-do", "🚧"] {
            assert_eq!(classify(Some(s)), StatusCategory::Pending, "{s}");
        }
    }

    #[test]
    fn classify_is_total_over_mixed_inputs() {
        let inputs = [
            None,
            Some(""),
            Some("completed"),
            Some("Incomplete"),
            Some("progress todo"),
            Some("to do / in progress / complete"),
            Some("pending"),
            Some("ÜBER progress"),
        ];
        for input in inputs {
            let c = classify(input);
            assert!(StatusCategory::ALL.contains(&c));
            // Deterministic.
            assert_eq!(c, classify(input));
        }
        // Substring rule: "Incomplete" contains "complete".
        assert_eq!(classify(Some("Incomplete")), StatusCategory::Completed);
    }

    #[test]
    fn parses_query_names() {
        assert_eq!("completed".parse(), Ok(StatusCategory::Completed));
        assert_eq!("In Progress".parse(), Ok(StatusCategory::InProgress));
        assert_eq!("in_progress".parse(), Ok(StatusCategory::InProgress));
        assert_eq!("TODO".parse(), Ok(StatusCategory::ToDo));
        assert_eq!(" pending ".parse(), Ok(StatusCategory::Pending));
        assert!("done".parse::<StatusCategory>().is_err());
    }

    #[test]
    fn presentation_helpers_cover_all_categories() {
        let classes: Vec<_> = StatusCategory::ALL.iter().map(|c| c.css_class()).collect();
        assert_eq!(
            classes,
            vec!["status-completed", "status-progress", "status-todo", "status-pending"]
        );
        assert_eq!(StatusCategory::ToDo.to_string(), "To Do");
        assert_eq!(StatusCategory::Pending.badge(), "⏳");
    }
}
