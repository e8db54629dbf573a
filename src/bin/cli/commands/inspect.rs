use std::path::Path;

use anyhow::{Context, Result};

use trish_lib::deck::read_summary;

use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

pub fn run(package: &Path, show_notes: bool, format: &OutputFormat, use_color: bool) -> Result<()> {
    let summary = read_summary(package)
        .with_context(|| format!("Failed to read {}", package.display()))?;

    match format {
        OutputFormat::Json => {
            if show_notes {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                let output = serde_json::json!({
                    "name": summary.name,
                    "description": summary.description,
                    "noteCount": summary.note_count,
                    "cardCount": summary.card_count,
                    "tags": summary.tags,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }
        OutputFormat::Plain => {
            println!("{}", paint(&summary.name, Color::BOLD, use_color));
            if !summary.description.is_empty() {
                println!("{}", paint(&summary.description, Color::DIM, use_color));
            }
            println!("{} notes, {} cards", summary.note_count, summary.card_count);

            if !summary.tags.is_empty() {
                println!("\nTags:");
                for tag in &summary.tags {
                    println!("  #{}", tag);
                }
            }

            if show_notes {
                println!("\nNotes:");
                for note in &summary.notes {
                    let front = note.fields.get(2).or(note.fields.first());
                    println!(
                        "  {} {}",
                        paint(&note.guid, Color::CYAN, use_color),
                        front.map(String::as_str).unwrap_or_default()
                    );
                }
            }
        }
    }

    Ok(())
}
