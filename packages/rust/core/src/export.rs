//! Result table export (Excel, CSV, JSON) and terminal rendering.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use qforge_shared::{OUTPUT_COLUMNS, OutputRow, QforgeError, Result, RunReport};

/// Worksheet holding the result table in Excel exports.
const SHEET_NAME: &str = "Questions";

/// Widest cell shown by [`render_table`] before truncation.
const MAX_CELL_WIDTH: usize = 48;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = QforgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xlsx" => Ok(Self::Xlsx),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(QforgeError::validation(format!(
                "unsupported export format {other:?} (expected xlsx, csv or json)"
            ))),
        }
    }
}

/// `qforge-<timestamp>.<ext>` inside `dir`, named after the run's start time.
pub fn default_output_path(dir: &Path, report: &RunReport, format: ExportFormat) -> PathBuf {
    dir.join(format!(
        "qforge-{}.{}",
        report.started_at.format("%Y%m%d-%H%M%S"),
        format.extension()
    ))
}

/// Write the report in `format` to `path`.
pub fn write_report(report: &RunReport, path: &Path, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Xlsx => write_xlsx(&report.rows, path),
        ExportFormat::Csv => write_csv(&report.rows, path),
        ExportFormat::Json => write_json(report, path),
    }
}

/// Write rows to a single-sheet Excel workbook with a bold header row.
///
/// Every field is written as a string cell.
pub fn write_xlsx(rows: &[OutputRow], path: &Path) -> Result<()> {
    let data = xlsx_bytes(rows)
        .map_err(|e| QforgeError::Export(format!("Excel encoding failed: {e}")))?;

    write_atomic(path, &data)?;
    debug!(path = %path.display(), rows = rows.len(), "wrote Excel export");
    Ok(())
}

fn xlsx_bytes(rows: &[OutputRow]) -> std::result::Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, title) in (0u16..).zip(OUTPUT_COLUMNS) {
        sheet.write_string_with_format(0, col, title, &header)?;
    }
    for (row, fields) in (1u32..).zip(rows.iter().map(OutputRow::fields)) {
        for (col, field) in (0u16..).zip(fields) {
            sheet.write_string(row, col, field)?;
        }
    }
    sheet.autofit();

    workbook.save_to_buffer()
}

/// Write rows as CSV with a header row.
pub fn write_csv(rows: &[OutputRow], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(OUTPUT_COLUMNS)
        .map_err(|e| QforgeError::Export(format!("CSV encoding failed: {e}")))?;
    for row in rows {
        writer
            .write_record(row.fields())
            .map_err(|e| QforgeError::Export(format!("CSV encoding failed: {e}")))?;
    }
    let data = writer
        .into_inner()
        .map_err(|e| QforgeError::Export(format!("CSV encoding failed: {e}")))?;

    write_atomic(path, &data)?;
    debug!(path = %path.display(), rows = rows.len(), "wrote CSV export");
    Ok(())
}

/// Write the full report (metadata and rows) as pretty-printed JSON.
pub fn write_json(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(report)
        .map_err(|e| QforgeError::Export(format!("JSON serialization failed: {e}")))?;

    write_atomic(path, &json)?;
    debug!(path = %path.display(), rows = report.rows.len(), "wrote JSON export");
    Ok(())
}

/// Write to a hidden temp sibling, then rename over the target.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| QforgeError::io(parent, e))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| QforgeError::Export(format!("invalid output path: {}", path.display())))?;
    let temp = parent.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, data).map_err(|e| QforgeError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| QforgeError::io(path, e))?;
    Ok(())
}

/// Render rows as an aligned plain-text table.
pub fn render_table(rows: &[OutputRow]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.fields().iter().map(|f| clip(f)).collect())
        .collect();

    let mut widths: Vec<usize> = OUTPUT_COLUMNS.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, OUTPUT_COLUMNS.iter().copied(), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, rule.iter().map(String::as_str), &widths);
    for row in &cells {
        push_line(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    out.push_str(line.join(" | ").trim_end());
    out.push('\n');
}

/// Single-line cell text, cut at [`MAX_CELL_WIDTH`] characters.
fn clip(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_CELL_WIDTH {
        return flat;
    }
    let mut clipped: String = flat.chars().take(MAX_CELL_WIDTH - 3).collect();
    clipped.push_str("...");
    clipped
}
