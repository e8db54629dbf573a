use std::path::PathBuf;

use anyhow::{Context, Result};

use trish_lib::deck::{build_deck, default_output_path, DeckOptions};

use crate::app::App;
use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

#[allow(clippy::too_many_arguments)]
pub fn run(
    app: &App,
    inputs: &[PathBuf],
    title: &str,
    output: Option<PathBuf>,
    voice: Option<String>,
    version: &str,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let output = output.unwrap_or_else(|| default_output_path(title));
    let mut options = DeckOptions::new(title, output, version);
    options.voice = voice.unwrap_or_else(|| app.config.voice.clone());
    options.tag_prefix = app.config.tag_prefix.clone();

    let summary = build_deck(&options, inputs)
        .with_context(|| format!("Failed to build deck '{}'", title))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Plain => {
            println!(
                "Loaded {} files, {} unique conditions",
                summary.inputs, summary.conditions
            );
            println!("Version: {}", summary.version);
            println!("Voice: {} (plus fallbacks)", summary.voice);
            println!(
                "{} deck '{}' saved to {} ({} cards + version card)",
                paint("Built", Color::GREEN, use_color),
                summary.title,
                summary.output.display(),
                summary.content_notes
            );
        }
    }

    Ok(())
}
