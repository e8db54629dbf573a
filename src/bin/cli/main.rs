mod app;
mod commands;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use trish_lib::config::CONFIG_FILE_NAME;
use trish_lib::workflow::Mode;

#[derive(Parser)]
#[command(name = "trish", about = "Illness-script decks: export, build, publish", version)]
struct Cli {
    /// Pipeline config file, relative to the repository root
    #[arg(long, global = true, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Repository root
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Print a version stamp for the current minute
    Stamp,

    /// Export one sheet of a workbook to TSV
    Export {
        /// Path to the .ods workbook
        workbook: PathBuf,
        /// Name of the sheet to export
        sheet: String,
        /// Output TSV path (default: <sheet>.tsv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a deck package from TSV exports
    Build {
        /// Input TSV files
        #[arg(short, long = "input", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
        /// Deck title
        #[arg(short = 'd', long = "deck-name", default_value = "TRISH")]
        title: String,
        /// Output package path (default: derived from the title)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Preferred text-to-speech voice (default: from config)
        #[arg(short, long)]
        voice: Option<String>,
        /// Version label embedded in the deck
        #[arg(short = 't', long = "tag", default_value = "Unknown")]
        version: String,
    },

    /// Rewrite version markers in the download page
    UpdatePage {
        /// HTML page to rewrite
        page: PathBuf,
        /// Version stamp to write
        #[arg(long)]
        version: String,
        /// Deck file name the download links should point to
        #[arg(long)]
        artifact: String,
    },

    /// Commit, tag and push all changes in the repository
    Publish {
        /// Version stamp (default: current minute)
        #[arg(long)]
        version: Option<String>,
        /// Commit and tag without pushing
        #[arg(long)]
        no_push: bool,
    },

    /// Export every section and build one deck per section, then publish
    PerSubject,

    /// Export every section, build one deck, update the page, then publish
    Unified,

    /// Show what a deck package contains
    Inspect {
        /// Path to the .apkg file
        package: PathBuf,
        /// List every note
        #[arg(long)]
        notes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && std::io::stdout().is_terminal();

    match cli.command {
        Command::Stamp => {
            commands::stamp::run(&cli.format)?;
        }
        Command::Export { workbook, sheet, output } => {
            commands::export::run(&workbook, &sheet, output.as_deref(), &cli.format, use_color)?;
        }
        Command::Build { inputs, title, output, voice, version } => {
            let app = app::App::new(&cli.repo, &cli.config)?;
            commands::build::run(
                &app,
                &inputs,
                &title,
                output,
                voice,
                &version,
                &cli.format,
                use_color,
            )?;
        }
        Command::UpdatePage { page, version, artifact } => {
            let app = app::App::new(&cli.repo, &cli.config)?;
            commands::page::run(&app, &page, &version, &artifact, &cli.format, use_color)?;
        }
        Command::Publish { version, no_push } => {
            let app = app::App::new(&cli.repo, &cli.config)?;
            commands::publish::run(&app, version.as_deref(), no_push, &cli.format, use_color)?;
        }
        Command::PerSubject => {
            let app = app::App::new(&cli.repo, &cli.config)?;
            commands::run::run(&app, Mode::PerSubject, &cli.format, use_color)?;
        }
        Command::Unified => {
            let app = app::App::new(&cli.repo, &cli.config)?;
            commands::run::run(&app, Mode::Unified, &cli.format, use_color)?;
        }
        Command::Inspect { package, notes } => {
            commands::inspect::run(&package, notes, &cli.format, use_color)?;
        }
    }

    Ok(())
}
