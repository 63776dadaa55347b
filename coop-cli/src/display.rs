//! Rendering of controller replies.

use std::io::{self, Write};

use anyhow::Result;
use colored::Colorize;
use coop::Reply;

use crate::shell::PROMPT;

/// Output format for replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// One-line description of a reply.
pub(crate) fn describe(reply: &Reply) -> String {
    match reply {
        Reply::PingAck => "Received ping reply".into(),
        Reply::TimeReport { text } => format!("Received current time on the controller: {text}"),
        Reply::Unrecognized { raw } => format!(
            "Received {} with no implemented reply handling",
            String::from_utf8_lossy(raw)
        )
        .yellow()
        .to_string(),
        Reply::Malformed { raw } => {
            format!("Invalid reply {:?}", String::from_utf8_lossy(raw))
                .yellow()
                .to_string()
        }
    }
}

/// Formats a reply for `listen`.
pub(crate) fn render(reply: &Reply, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => describe(reply),
        OutputFormat::Json => serde_json::to_string(reply)?,
    })
}

/// Prints a reply on its own line and redraws the shell prompt.
pub(crate) fn print_interleaved(reply: &Reply) {
    let mut out = io::stdout().lock();
    // A closed stdout only loses display output.
    let _ = write!(out, "\n{}\n{PROMPT}", describe(reply));
    let _ = out.flush();
}
