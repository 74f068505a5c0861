use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::OutputConfig;
use crate::error::{CrawlError, Result};
use crate::parser::ProcessedArticle;

/// Everything one crawl run produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DigestReport {
    pub timestamp: DateTime<Utc>,
    pub articles: Vec<ProcessedArticle>,
}

impl DigestReport {
    pub fn new(articles: Vec<ProcessedArticle>) -> Self {
        Self {
            timestamp: Utc::now(),
            articles,
        }
    }
}

pub trait OutputFormatter {
    fn format_report(&self, report: &DigestReport) -> Result<String>;
    fn file_extension(&self) -> &str;
    fn header(&self) -> Option<String>;
}

/// The whole report as one pretty-printed document.
pub struct JsonFormatter;
/// One article per line.
pub struct JsonlFormatter;
pub struct CsvFormatter {
    columns: Vec<String>,
}

impl OutputFormatter for JsonFormatter {
    fn format_report(&self, report: &DigestReport) -> Result<String> {
        let mut output = serde_json::to_string_pretty(report)
            .map_err(|e| CrawlError::StorageError(format!("JSON serialization failed: {}", e)))?;
        output.push('\n');
        Ok(output)
    }

    fn file_extension(&self) -> &str {
        "json"
    }

    fn header(&self) -> Option<String> {
        None
    }
}

impl OutputFormatter for JsonlFormatter {
    fn format_report(&self, report: &DigestReport) -> Result<String> {
        let mut output = String::new();
        for article in &report.articles {
            let json_line = serde_json::to_string(article)
                .map_err(|e| CrawlError::StorageError(format!("JSON serialization failed: {}", e)))?;
            output.push_str(&json_line);
            output.push('\n');
        }
        Ok(output)
    }

    fn file_extension(&self) -> &str {
        "jsonl"
    }

    fn header(&self) -> Option<String> {
        None
    }
}

impl CsvFormatter {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn default_columns() -> Vec<String> {
        [
            "id",
            "site",
            "title",
            "link",
            "summary_en",
            "summary_zh",
            "key_points_en",
            "key_points_zh",
            "timestamp",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect()
    }

    fn escape_csv_field(field: &str) -> String {
        if field.contains([',', '"', '\n', '\r']) {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn extract_field_value(article: &ProcessedArticle, column: &str) -> String {
        match column {
            "id" => article.id.clone(),
            "site" => article.site.clone(),
            "title" => article.title.clone(),
            "link" => article.link.clone(),
            "summary_en" => article.summary_en.clone(),
            "summary_zh" => article.summary_zh.clone(),
            "key_points_en" => article.key_points_en.join("; "),
            "key_points_zh" => article.key_points_zh.join("; "),
            "timestamp" => article.timestamp.to_rfc3339(),
            _ => String::new(),
        }
    }
}

impl OutputFormatter for CsvFormatter {
    fn format_report(&self, report: &DigestReport) -> Result<String> {
        let mut output = String::new();

        for article in &report.articles {
            let row: Vec<String> = self
                .columns
                .iter()
                .map(|column| Self::escape_csv_field(&Self::extract_field_value(article, column)))
                .collect();
            output.push_str(&row.join(","));
            output.push('\n');
        }

        Ok(output)
    }

    fn file_extension(&self) -> &str {
        "csv"
    }

    fn header(&self) -> Option<String> {
        Some(self.columns.join(","))
    }
}

pub fn formatter_for(format: &str) -> Result<Box<dyn OutputFormatter + Send + Sync>> {
    match format {
        "json" => Ok(Box::new(JsonFormatter)),
        "jsonl" => Ok(Box::new(JsonlFormatter)),
        "csv" => Ok(Box::new(CsvFormatter::new(CsvFormatter::default_columns()))),
        _ => Err(CrawlError::ConfigError(format!("Unsupported format: {}", format)).into()),
    }
}

/// Writes reports to `<directory>/<file_name>.<ext>`, replacing the previous run.
pub struct ReportWriter {
    output_dir: PathBuf,
    file_name: String,
    formatter: Box<dyn OutputFormatter + Send + Sync>,
}

impl ReportWriter {
    pub fn new(output: &OutputConfig) -> Result<Self> {
        Ok(Self {
            output_dir: output.directory.clone(),
            file_name: output.file_name.clone(),
            formatter: formatter_for(&output.format)?,
        })
    }

    pub fn with_formatter(mut self, formatter: Box<dyn OutputFormatter + Send + Sync>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.file_name, self.formatter.file_extension()))
    }

    pub async fn write(&self, report: &DigestReport) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| CrawlError::StorageError(format!("Failed to create output directory {:?}: {}", self.output_dir, e)))?;

        let mut content = String::new();
        if let Some(header) = self.formatter.header() {
            content.push_str(&header);
            content.push('\n');
        }
        content.push_str(&self.formatter.format_report(report)?);

        let path = self.output_path();
        debug!("Writing {} bytes to {:?}", content.len(), path);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| CrawlError::StorageError(format!("Failed to write {:?}: {}", path, e)))?;

        info!("Saved {} articles to {:?}", report.articles.len(), path);
        Ok(path)
    }
}
