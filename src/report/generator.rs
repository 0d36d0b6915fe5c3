//! Dataset rendering.
//!
//! Turns an [`IngestOutcome`] into text in one of the supported formats.
//! Nothing here inspects the values beyond counting them.

use crate::cli::OutputFormat;
use crate::models::{AuthResult, DatasetSummary, FileFailure, IngestOutcome, ReportDataset};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Render the outcome in the requested format.
pub fn render(outcome: &IngestOutcome, format: OutputFormat, show_summary: bool) -> Result<String> {
    match format {
        OutputFormat::Table => {
            let mut output = generate_table(&outcome.dataset);
            if show_summary && !outcome.dataset.is_empty() {
                output.push('\n');
                output.push_str(&generate_summary(&DatasetSummary::from_dataset(
                    &outcome.dataset,
                )));
            }
            Ok(output)
        }
        OutputFormat::Csv => Ok(generate_csv(&outcome.dataset)),
        OutputFormat::Json => generate_json(outcome, Utc::now()),
    }
}

/// Generate an aligned text table with a leading row index.
pub fn generate_table(dataset: &ReportDataset) -> String {
    if dataset.is_empty() {
        return "Empty dataset\n".to_string();
    }

    let index_width = (dataset.len() - 1).to_string().len();
    let mut widths = AuthResult::COLUMNS.map(str::len);
    for record in dataset {
        for (width, field) in widths.iter_mut().zip(record.fields()) {
            *width = (*width).max(field.chars().count());
        }
    }

    let mut output = String::new();

    // Header
    output.push_str(&" ".repeat(index_width));
    for (column, width) in AuthResult::COLUMNS.iter().zip(widths) {
        output.push_str(&format!("  {:<width$}", column, width = width));
    }
    end_line(&mut output);

    for (index, record) in dataset.iter().enumerate() {
        output.push_str(&format!("{:<width$}", index, width = index_width));
        for (field, width) in record.fields().iter().zip(widths) {
            output.push_str(&format!("  {:<width$}", field, width = width));
        }
        end_line(&mut output);
    }

    output.push_str(&format!(
        "\n[{} rows x {} columns]\n",
        dataset.len(),
        AuthResult::COLUMNS.len()
    ));

    output
}

/// Drop trailing padding from the current line and terminate it.
fn end_line(output: &mut String) {
    let trimmed = output.trim_end_matches(' ').len();
    output.truncate(trimmed);
    output.push('\n');
}

/// Generate the counts block printed under the table.
pub fn generate_summary(summary: &DatasetSummary) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Total records: {}", summary.total));
    lines.push(format!("Distinct sources: {}", summary.distinct_sources));

    if !summary.by_disposition.is_empty() {
        lines.push("By disposition:".to_string());
        for (disposition, count) in &summary.by_disposition {
            lines.push(format!("- {}: {}", disposition, count));
        }
    }

    let mut output = lines.join("\n");
    output.push('\n');
    output
}

/// Generate CSV with a header row.
pub fn generate_csv(dataset: &ReportDataset) -> String {
    let mut output = AuthResult::COLUMNS.join(",");
    output.push('\n');

    for record in dataset.records() {
        let row: Vec<_> = record.fields().iter().map(|f| csv_field(f)).collect();
        output.push_str(&row.join(","));
        output.push('\n');
    }

    output
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    documents: usize,
    records: &'a ReportDataset,
    failures: &'a [FileFailure],
}

/// Generate a JSON document with records and any skipped files.
pub fn generate_json(outcome: &IngestOutcome, generated_at: DateTime<Utc>) -> Result<String> {
    let report = JsonReport {
        generated_at,
        documents: outcome.documents,
        records: &outcome.dataset,
        failures: &outcome.failures,
    };
    serde_json::to_string_pretty(&report).context("Failed to serialize dataset to JSON")
}
