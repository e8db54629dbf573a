use std::path::Path;

use anyhow::{Context, Result};

use trish_lib::publish::{update_page, PageMarkers};
use trish_lib::stamp::VersionStamp;

use crate::app::App;
use crate::render::terminal::page_line;
use crate::OutputFormat;

pub fn run(
    app: &App,
    page: &Path,
    version: &str,
    artifact: &str,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let stamp = VersionStamp::parse(version)?;
    let markers = PageMarkers::from(&app.config.page);

    let update = update_page(page, &stamp, artifact, &markers)
        .with_context(|| format!("Failed to update {}", page.display()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&update)?),
        OutputFormat::Plain => {
            println!("{}", page_line(&update, use_color));
            for rule in &update.skipped {
                println!("  no {} marker", rule.name());
            }
        }
    }

    Ok(())
}
