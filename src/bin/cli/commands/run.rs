use anyhow::Result;

use trish_lib::stamp::VersionStamp;
use trish_lib::workflow::Mode;

use crate::app::App;
use crate::render::terminal::{page_line, paint, publish_line, Color};
use crate::OutputFormat;

pub fn run(app: &App, mode: Mode, format: &OutputFormat, use_color: bool) -> Result<()> {
    let stamp = VersionStamp::now();
    if let OutputFormat::Plain = format {
        println!(
            "{} {} run {} ({})",
            paint("Starting", Color::BOLD, use_color),
            mode,
            stamp,
            app.config_path.display()
        );
    }

    let report = match app.workflow().run(mode, &stamp) {
        Ok(report) => report,
        Err(e) => {
            let stage = e.stage();
            if let OutputFormat::Plain = format {
                println!("{} at {} stage", paint("Stopped", Color::RED, use_color), stage);
            }
            return Err(anyhow::Error::new(e)
                .context(format!("{} run {} stopped at {} stage", mode, stamp, stage)));
        }
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Plain => {
            for export in &report.exports {
                println!(
                    "{} {} ({} rows) -> {}",
                    paint("export", Color::GREEN, use_color),
                    export.sheet,
                    export.rows,
                    export.output.display()
                );
            }
            for deck in &report.decks {
                println!(
                    "{} {} ({} cards) -> {}",
                    paint("deck", Color::GREEN, use_color),
                    deck.title,
                    deck.content_notes,
                    deck.output.display()
                );
            }
            if let Some(page) = &report.page {
                println!("{}", page_line(page, use_color));
            }
            match &report.publish {
                Some(outcome) => println!("{}", publish_line(outcome, use_color)),
                None => println!("{} disabled", paint("publish", Color::DIM, use_color)),
            }
        }
    }

    Ok(())
}
