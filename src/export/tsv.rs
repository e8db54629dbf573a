use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::spreadsheet::{Sheet, Workbook};

use super::Result;

/// Outcome of exporting one sheet
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub sheet: String,
    pub output: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

/// Default output path for a sheet: `<sheet>.tsv` in the working directory
pub fn default_output_path(sheet_name: &str) -> PathBuf {
    PathBuf::from(format!("{}.tsv", sheet_name))
}

/// Export one sheet of a workbook file to TSV
pub fn export_sheet_to_tsv(
    workbook_path: &Path,
    sheet_name: &str,
    output: Option<&Path>,
) -> Result<ExportSummary> {
    let workbook = Workbook::open(workbook_path)?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(sheet_name));
    export_from_workbook(&workbook, sheet_name, &output)
}

/// Export one sheet of an already opened workbook
pub fn export_from_workbook(
    workbook: &Workbook,
    sheet_name: &str,
    output: &Path,
) -> Result<ExportSummary> {
    let sheet = workbook.sheet(sheet_name)?;
    write_sheet(sheet, output)?;

    log::info!(
        "Exported sheet '{}' ({} rows) to {:?}",
        sheet.name,
        sheet.row_count(),
        output
    );

    Ok(ExportSummary {
        sheet: sheet.name.clone(),
        output: output.to_path_buf(),
        rows: sheet.row_count(),
        columns: sheet.column_count(),
    })
}

/// Write rows as TSV. Cells with tabs, newlines or quotes are quoted so
/// multi-line cells survive a read back.
pub fn write_sheet(sheet: &Sheet, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(output)?;

    for row in &sheet.rows {
        if row.is_empty() {
            // csv skips zero-field records entirely
            writer.write_record([""])?;
        } else {
            writer.write_record(row)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Read a TSV export back into rows
pub fn read_tsv(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}
