use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Local};

use crate::session::{Message, Role};

const SEPARATOR_WIDTH: usize = 50;

/// Render the conversation as the plain-text export document.
pub fn render_transcript(messages: &[Message], exported_at: DateTime<Local>) -> String {
    let separator = "=".repeat(SEPARATOR_WIDTH);

    let mut out = String::new();
    out.push_str("Weather Chat Export\n");
    out.push_str(&separator);
    out.push_str("\n\n");

    for message in messages {
        let speaker = match message.role {
            Role::User => "You",
            Role::Agent => "Weather Agent",
        };
        out.push_str(&format!(
            "[{}] {}:\n{}\n\n",
            message.timestamp.format("%I:%M %p"),
            speaker,
            message.content
        ));
    }

    out.push_str(&separator);
    out.push('\n');
    out.push_str(&format!(
        "Exported on {}\n",
        exported_at.format("%Y-%m-%d %H:%M:%S")
    ));

    out
}

pub fn export_filename(at: DateTime<Local>) -> String {
    format!("weather-chat-{}.txt", at.timestamp_millis())
}

/// Write the transcript into `dir` and return the path of the new file.
pub fn write_transcript(messages: &[Message], dir: &Path) -> Result<PathBuf> {
    let now = Local::now();
    let path = dir.join(export_filename(now));
    fs::write(&path, render_transcript(messages, now))?;
    Ok(path)
}

/// Where exports land: the user's download directory when there is one,
/// otherwise the current directory.
pub fn default_export_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}
