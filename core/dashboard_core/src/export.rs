use serde::Serialize;
use time::OffsetDateTime;

use crate::task::Task;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Html,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Html => "html",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
            ExportFormat::Html => "text/html; charset=utf-8",
        }
    }
}

/// One exported row, in the sheet's own column names.
#[derive(Serialize)]
struct ExportRecord<'a> {
    #[serde(rename = "Task")]
    task: &'a str,
    #[serde(rename = "Description")]
    description: &'a str,
    #[serde(rename = "Status")]
    status: Option<&'a str>,
    #[serde(rename = "Category")]
    category: &'static str,
}

impl<'a> From<&'a Task> for ExportRecord<'a> {
    fn from(t: &'a Task) -> Self {
        Self {
            task: &t.task,
            description: &t.description,
            status: t.status_raw.as_deref(),
            category: t.status_category.label(),
        }
    }
}

pub fn render(format: ExportFormat, tasks: &[Task]) -> anyhow::Result<String> {
    match format {
        ExportFormat::Csv => export_csv(tasks),
        ExportFormat::Json => export_json(tasks),
        ExportFormat::Html => Ok(export_html(tasks)),
    }
}

pub fn export_csv(tasks: &[Task]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    if tasks.is_empty() {
        wtr.write_record(["Task", "Description", "Status", "Category"])?;
    }
    for t in tasks {
        wtr.serialize(ExportRecord::from(t))?;
    }
    let bytes = wtr.into_inner().map_err(|e| anyhow::anyhow!("csv flush failed: {e}"))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn export_json(tasks: &[Task]) -> anyhow::Result<String> {
    let records: Vec<ExportRecord> = tasks.iter().map(ExportRecord::from).collect();
    Ok(serde_json::to_string(&records)?)
}

pub fn export_html(tasks: &[Task]) -> String {
    let mut out = String::new();
    out.push_str("<table class=\"tasks\">\n");
    out.push_str("<thead><tr><th>Task</th><th>Description</th><th>Status</th></tr></thead>\n");
    out.push_str("<tbody>\n");
    for t in tasks {
        out.push_str(&format!(
            "<tr><td>{} {}</td><td>{}</td><td><span class=\"status-badge {}\">{}</span></td></tr>\n",
            t.status_category.badge(),
            html_escape(&t.task),
            html_escape(&t.description),
            t.status_category.css_class(),
            html_escape(t.status_label()),
        ));
    }
    out.push_str("</tbody>\n</table>\n");
    out
}

/// `tasks_YYYYMMDD_HHMMSS.<ext>`
pub fn export_file_name(format: ExportFormat, at: OffsetDateTime) -> String {
    format!(
        "tasks_{:04}{:02}{:02}_{:02}{:02}{:02}.{}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second(),
        format.extension()
    )
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
