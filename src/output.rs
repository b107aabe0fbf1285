use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, RunWarning};
use crate::bundle::BundleSummary;
use crate::listing::Listing;
use crate::report::{Report, ReportCounts};
use crate::resolver::{ChoiceEntry, Disambiguation};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Everything a run produced, as printed in non-interactive mode.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub strategy: String,
    pub counts: ReportCounts,
    pub report: Report,
    pub pending: Vec<Disambiguation>,
    pub choices: Vec<ChoiceEntry>,
    pub warnings: Vec<RunWarning>,
    pub skipped_rows: Vec<usize>,
    pub bundle: Option<BundleSummary>,
    pub download_dir: Option<String>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_listing(listing: &Listing) -> io::Result<()> {
        Self::print_json(listing)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Prints progress lines to stderr for interactive runs.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn event(&self, event: ProgressEvent) {
        let cyan = "\x1b[36m";
        let yellow = "\x1b[33m";
        let reset = "\x1b[0m";
        let color = if event.message.starts_with("warning:") {
            yellow
        } else {
            cyan
        };
        let message = event
            .message
            .split_once("; ")
            .filter(|(head, _)| head.starts_with("phase="))
            .map(|(_, rest)| rest)
            .unwrap_or(event.message.as_str());
        match event.elapsed {
            Some(elapsed) => eprintln!("{color}{message}{reset} ({} ms)", elapsed.as_millis()),
            None => eprintln!("{color}{message}{reset}"),
        }
    }
}
