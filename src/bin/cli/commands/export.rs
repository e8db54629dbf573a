use std::path::Path;

use anyhow::{Context, Result};

use trish_lib::export::export_sheet_to_tsv;

use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

pub fn run(
    workbook: &Path,
    sheet: &str,
    output: Option<&Path>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let summary = export_sheet_to_tsv(workbook, sheet, output).with_context(|| {
        format!("Failed to export sheet '{}' from {}", sheet, workbook.display())
    })?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Plain => {
            println!(
                "{} sheet '{}' to {} ({} rows, {} columns)",
                paint("Exported", Color::GREEN, use_color),
                summary.sheet,
                summary.output.display(),
                summary.rows,
                summary.columns
            );
        }
    }

    Ok(())
}
