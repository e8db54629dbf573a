use anyhow::{Context, Result};

use trish_lib::git::{publish, PublishOptions};
use trish_lib::stamp::VersionStamp;

use crate::app::App;
use crate::render::terminal::publish_line;
use crate::OutputFormat;

pub fn run(
    app: &App,
    version: Option<&str>,
    no_push: bool,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let stamp = match version {
        Some(v) => VersionStamp::parse(v)?,
        None => VersionStamp::now(),
    };

    let mut options = PublishOptions::from(&app.config.publish);
    if no_push {
        options.push = false;
    }

    let outcome = publish(&app.root, &stamp, &options)
        .with_context(|| format!("Failed to publish {} from {}", stamp, app.root.display()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Plain => println!("{}", publish_line(&outcome, use_color)),
    }

    Ok(())
}
