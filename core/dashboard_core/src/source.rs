use async_trait::async_trait;
use std::time::Duration;

use crate::task::RawRow;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("malformed CSV: {0}")]
    Malformed(String),
}

/// Where the dashboard's rows come from. Called once per refresh.
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>, FetchError>;

    /// Human readable origin, for logs.
    fn describe(&self) -> String;
}

/// A published spreadsheet read through its CSV export link.
pub struct SheetSource {
    client: reqwest::Client,
    url: String,
}

impl SheetSource {
    pub fn new(url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    pub fn export_url(sheet_id: &str) -> String {
        format!(
            "https://docs.google.com/spreadsheets/d/{}/export?format=csv",
            sheet_id.trim()
        )
    }
}

#[async_trait]
impl RowSource for SheetSource {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>, FetchError> {
        let res = self.client.get(&self.url).send().await?;
        if !res.status().is_success() {
            return Err(FetchError::Status(res.status().as_u16()));
        }
        let is_html = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("text/html"));
        if is_html {
            // Private sheets answer with a sign-in page instead of CSV.
            return Err(FetchError::Malformed(
                "expected CSV but got an HTML page; is the sheet shared publicly?".to_string(),
            ));
        }
        let body = res.bytes().await?;
        parse_csv(&body)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Decodes CSV text with a header row. Empty cells become absent values and
/// rows with no values at all are skipped.
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<RawRow>, FetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| FetchError::Malformed(e.to_string()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| FetchError::Malformed(e.to_string()))?;
        let row = RawRow::new(
            headers
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let cell = record.get(i).filter(|v| !v.is_empty()).map(str::to_string);
                    (name.clone(), cell)
                })
                .collect(),
        );
        if !row.is_blank() {
            rows.push(row);
        }
    }
    Ok(rows)
}
