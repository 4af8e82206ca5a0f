//! Text rendering of session state for the terminal.
//!
//! Every function here is pure: it reads state by reference and returns the
//! text to print.

use crate::credentials::CredentialHost;
use crate::image::{GeneratedMedia, ImageProvider, SettingsForm};
use crate::session::controller::StudioController;
use crate::session::history::History;
use crate::session::ticker::TickerStatus;

const PROGRESS_WIDTH: usize = 20;
const PROMPT_PREVIEW_CHARS: usize = 48;

/// Renders the current form selections.
pub fn render_form(form: &SettingsForm) -> String {
    let mut lines = vec![
        format!("Engine:   {} ({})", form.model.label(), form.model),
        format!("Ratio:    {}", form.aspect_ratio),
    ];
    if form.model.supports_image_size() {
        lines.push(format!("Quality:  {}", form.image_size));
    }
    if !form.negative_prompt.trim().is_empty() {
        lines.push(format!("Exclude:  {}", form.negative_prompt.trim()));
    }
    if form.has_prompt() {
        lines.push(format!("Prompt:   {}", form.prompt.trim()));
    }
    join_lines(lines)
}

/// Renders a progress bar with the current status label.
pub fn render_status(status: TickerStatus) -> String {
    let filled = (status.progress() * PROGRESS_WIDTH as f32).round() as usize;
    format!(
        "[{}{}] {}",
        "#".repeat(filled),
        "-".repeat(PROGRESS_WIDTH - filled.min(PROGRESS_WIDTH)),
        status.message()
    )
}

/// Renders the displayed image's details.
pub fn render_media(media: &GeneratedMedia) -> String {
    let mut lines = vec![format!("\"{}\"", media.prompt)];
    if let Some(negative) = &media.negative_prompt {
        lines.push(format!("  excluding: {negative}"));
    }
    lines.push(format!(
        "  {} | {} | {}",
        media.aspect_ratio,
        media.model.label(),
        media.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.push(format!("  download as {}", media.download_file_name()));
    join_lines(lines)
}

/// Renders the history as a numbered list, most recent first.
pub fn render_history(history: &History) -> String {
    if history.is_empty() {
        return "No creations yet. Your generated images will appear here.\n".to_string();
    }

    let displayed = history.displayed().map(|media| media.id);
    let header = format!("Creation history ({} assets)", history.len());
    let entries = history.iter().enumerate().map(|(index, media)| {
        let marker = if Some(media.id) == displayed { '*' } else { ' ' };
        format!(
            "{marker}{:>3}. [{}] {}",
            index + 1,
            media.aspect_ratio,
            preview(&media.prompt)
        )
    });
    join_lines(std::iter::once(header).chain(entries).collect())
}

/// Renders the whole session: form, progress or result, and any error.
pub fn render_session<P, C>(controller: &StudioController<P, C>) -> String
where
    P: ImageProvider,
    C: CredentialHost,
{
    let mut out = render_form(controller.form());
    out.push('\n');
    match (controller.status(), controller.current()) {
        (Some(status), _) => {
            out.push_str(&render_status(status));
            out.push('\n');
        }
        (None, Some(media)) => out.push_str(&render_media(media)),
        (None, None) => out.push_str("Nothing generated yet.\n"),
    }
    if let Some(error) = controller.error() {
        out.push_str(&format!("\nerror: {error}\n"));
    }
    out
}

/// Joins lines with a trailing newline after each.
fn join_lines(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn preview(prompt: &str) -> String {
    let prompt = prompt.trim();
    if prompt.chars().count() <= PROMPT_PREVIEW_CHARS {
        return prompt.to_string();
    }
    let mut short: String = prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
    short.push_str("...");
    short
}
