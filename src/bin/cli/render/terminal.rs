use trish_lib::git::PublishOutcome;
use trish_lib::publish::{PageStatus, PageUpdate};

/// ANSI color codes
pub struct Color;

impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
}

/// Wrap text in a color when colors are enabled
pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

/// One-line description of a page update
pub fn page_line(update: &PageUpdate, use_color: bool) -> String {
    match update.status {
        PageStatus::Missing => format!(
            "{} {} not found, skipped",
            paint("page", Color::YELLOW, use_color),
            update.path.display()
        ),
        PageStatus::Unchanged => format!(
            "{} {} already up to date",
            paint("page", Color::DIM, use_color),
            update.path.display()
        ),
        PageStatus::Updated => {
            let applied = update
                .applied
                .iter()
                .map(|r| r.name())
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "{} {} updated ({})",
                paint("page", Color::GREEN, use_color),
                update.path.display(),
                applied
            )
        }
    }
}

/// One-line description of a publish outcome
pub fn publish_line(outcome: &PublishOutcome, use_color: bool) -> String {
    match outcome {
        PublishOutcome::NoChanges => format!(
            "{} no changes to publish",
            paint("publish", Color::DIM, use_color)
        ),
        PublishOutcome::Published { commit, tag, pushed } => {
            let push = if pushed.is_empty() {
                "not pushed".to_string()
            } else {
                format!("pushed {} refs", pushed.len())
            };
            format!(
                "{} {} {} tagged {} ({})",
                paint("publish", Color::GREEN, use_color),
                paint(&commit.short_id, Color::CYAN, use_color),
                commit.message,
                paint(tag, Color::BOLD, use_color),
                push
            )
        }
    }
}
