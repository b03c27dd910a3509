use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use super::Sheet;
use crate::model::ScoreResult;
use crate::pipeline::{passes, RunReport};
use crate::{Error, Result};

pub const RESULTS_SHEET: &str = "Filtered Results";
pub const MODEL_INFO_SHEET: &str = "Model Info";
pub const SCORE_COLUMN: &str = "Relevance Score";
pub const STATUS_COLUMN: &str = "Status";

/// Excel refuses longer cell strings
const MAX_CELL_CHARS: usize = 32_767;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Rows scoring at or above this are exported
    pub threshold: f64,
    /// Export every scored row, not only the matches
    pub include_all: bool,
    /// Add the "Model Info" sheet to workbook output
    pub model_info: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            include_all: false,
            model_info: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows_written: usize,
    pub matched: usize,
}

/// Write the source rows of `report` with their score and status appended.
///
/// `.xlsx` gets a results sheet plus a run description sheet, `.csv` only the
/// results table.
pub fn write_export(path: &Path, sheet: &Sheet, report: &RunReport, options: &ExportOptions) -> Result<ExportSummary> {
    let matched = report.matched(options.threshold).len();
    let selected: Vec<&ScoreResult> = report
        .results
        .iter()
        .filter(|r| options.include_all || passes(r.score, options.threshold))
        .filter(|r| r.row_id < sheet.rows.len())
        .collect();

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    match ext.as_str() {
        "xlsx" => write_xlsx(path, sheet, report, &selected, options)?,
        "csv" => write_csv(path, sheet, &selected)?,
        other => {
            return Err(Error::Config(format!(
                "Unsupported output format '.{}' (expected .xlsx or .csv)",
                other
            )))
        }
    }

    tracing::info!(path = %path.display(), rows = selected.len(), matched, "Exported results");
    Ok(ExportSummary {
        rows_written: selected.len(),
        matched,
    })
}

fn header_row(sheet: &Sheet) -> Vec<&str> {
    sheet
        .headers
        .iter()
        .map(String::as_str)
        .chain([SCORE_COLUMN, STATUS_COLUMN])
        .collect()
}

fn write_csv(path: &Path, sheet: &Sheet, selected: &[&ScoreResult]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header_row(sheet))?;

    for result in selected {
        let score = result.score.map(|s| s.to_string()).unwrap_or_default();
        let record = sheet.rows[result.row_id]
            .iter()
            .map(String::as_str)
            .chain([score.as_str(), result.status.as_str()]);
        writer.write_record(record)?;
    }

    writer.flush()?;
    Ok(())
}

fn write_xlsx(
    path: &Path,
    sheet: &Sheet,
    report: &RunReport,
    selected: &[&ScoreResult],
    options: &ExportOptions,
) -> Result<()> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(RESULTS_SHEET)?;
        write_header(worksheet, &header_row(sheet), &bold)?;

        let score_col = sheet.headers.len() as u16;
        for (i, result) in selected.iter().enumerate() {
            let row = (i + 1) as u32;
            for (col, value) in sheet.rows[result.row_id].iter().enumerate() {
                if let Some(number) = numeric_cell(value) {
                    worksheet.write_number(row, col as u16, number)?;
                } else if !value.is_empty() {
                    worksheet.write_string(row, col as u16, cell_value(value))?;
                }
            }
            if let Some(score) = result.score {
                worksheet.write_number(row, score_col, score)?;
            }
            worksheet.write_string(row, score_col + 1, result.status.as_str())?;
        }
    }

    if options.model_info {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(MODEL_INFO_SHEET)?;
        write_header(worksheet, &["Parameter", "Value"], &bold)?;
        for (i, (key, value)) in model_info(report, options).iter().enumerate() {
            let row = (i + 1) as u32;
            worksheet.write_string(row, 0, *key)?;
            worksheet.write_string(row, 1, cell_value(value))?;
        }
        worksheet.set_column_width(0, 20)?;
        worksheet.set_column_width(1, 60)?;
    }

    workbook.save(path)?;
    Ok(())
}

fn write_header(worksheet: &mut Worksheet, headers: &[&str], format: &Format) -> Result<()> {
    for (col, name) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, format)?;
    }
    Ok(())
}

fn cell_value(value: &str) -> &str {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// Plain decimal numbers (years, citation counts) are written as numbers.
/// Identifiers with leading zeros or more digits than an f64 holds stay text.
fn numeric_cell(value: &str) -> Option<f64> {
    let digits = value.strip_prefix('-').unwrap_or(value);
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (digits, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if !all_digits(whole) || fraction.is_some_and(|f| !all_digits(f)) {
        return None;
    }
    if whole.len() > 1 && whole.starts_with('0') {
        return None;
    }
    if whole.len() + fraction.map_or(0, str::len) > 15 {
        return None;
    }
    value.parse().ok()
}

/// Key/value description of the run
fn model_info(report: &RunReport, options: &ExportOptions) -> Vec<(&'static str, String)> {
    let summary = report.summary();
    vec![
        ("Provider", report.provider.display_name().to_string()),
        ("Model", report.model.clone()),
        ("Topic", report.topic.clone()),
        ("Threshold", options.threshold.to_string()),
        ("Total Rows", summary.total.to_string()),
        ("Matched", report.matched(options.threshold).len().to_string()),
        ("Succeeded", summary.succeeded.to_string()),
        ("Parse Failures", summary.parse_failures.to_string()),
        ("Provider Errors", summary.provider_errors.to_string()),
        ("Skipped", summary.skipped.to_string()),
        ("Cancelled", summary.cancelled.to_string()),
        ("Outcome", report.outcome.to_string()),
        ("Run ID", report.run_id.to_string()),
        ("Started", report.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ("Finished", report.finished_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
    ]
}
