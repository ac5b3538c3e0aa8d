//! Human and JSON output formatting.
//!
//! Human output is colourised with `colored`; JSON output is one event
//! object per line (`status` per URL, `result` per hit, `statistics` at the
//! end of the run). All printing funnels through [`print_human`] and
//! [`print_json`] so the two modes never mix.

use crate::args::OutputFormat;
use crate::enumerate::BaseRequest;
use crate::probe::{escape, HttpStats};
use colored::Colorize;
use serde::Serialize;
use std::sync::atomic::Ordering;

pub const SEPARATOR: &str =
    "════════════════════════════════════════════════════════════════════════════════";

#[derive(Debug, Serialize)]
pub struct ResultEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub fullmatch: bool,
    pub baseurl: String,
    pub shortfile: String,
    pub shortext: String,
    pub shorttilde: String,
    pub partname: String,
    pub fullname: String,
}

#[derive(Debug, Serialize)]
pub struct StatusEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub url: String,
    pub server: String,
    pub vulnerable: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub requests: usize,
    pub retries: usize,
    pub sentbytes: usize,
    pub receivedbytes: usize,
}

/// Returns the main banner.
pub fn banner() -> String {
    format!(
        "{} · {}",
        format!("Tildescan v{}", env!("CARGO_PKG_VERSION"))
            .blue()
            .bold(),
        "an IIS short filename enumeration scanner".white().bold()
    )
}

/// Prints a line in human mode only.
pub fn print_human(output: OutputFormat, line: &str) {
    if output == OutputFormat::Human {
        println!("{line}");
    }
}

/// Prints a serialised event in JSON mode only.
pub fn print_json<T: Serialize>(output: OutputFormat, event: &T) {
    if output == OutputFormat::Json {
        if let Ok(j) = serde_json::to_string(event) {
            println!("{j}");
        }
    }
}

/// Emits one enumeration hit in the configured format.
///
/// The partial name carries a `?` suffix on the stem or extension when the
/// slot reached its length cap, indicating possible truncation.
pub fn emit_result(output: OutputFormat, fullurl: bool, br: &BaseRequest, fnr: Option<&str>) {
    let mut part_file = br.file.clone();
    if br.file.len() >= 6 {
        part_file.push('?');
    }
    let mut part_ext = br.ext.clone();
    if br.ext.len() >= 4 {
        part_ext.push('?');
    }

    match output {
        OutputFormat::Human => {
            let (part, full) = match fnr {
                Some(fnr) => {
                    let part = format!("{part_file}{part_ext}").bright_black().to_string();
                    let full = if fullurl {
                        format!(
                            "{}{}",
                            br.url.green(),
                            escape(&fnr.to_lowercase()).bright_green()
                        )
                    } else {
                        fnr.bright_green().to_string()
                    };
                    (part, full)
                }
                None => {
                    let file = if br.file.len() < 6 {
                        part_file.green().to_string()
                    } else {
                        part_file
                    };
                    let ext = if br.ext.len() < 4 {
                        part_ext.green().to_string()
                    } else {
                        part_ext
                    };
                    let part =
                        format!("{file}{ext}").replace('?', &"?".bright_black().to_string());
                    (part, String::new())
                }
            };
            println!(
                "{:<20} {:<28} {}",
                format!("{}{}{}", br.file, br.tilde, br.ext),
                part,
                full
            );
        }
        OutputFormat::Json => {
            let event = ResultEvent {
                kind: "result",
                fullmatch: fnr.is_some(),
                baseurl: br.url.clone(),
                shortfile: br.file.clone(),
                shortext: br.ext.clone(),
                shorttilde: br.tilde.clone(),
                partname: format!("{part_file}{part_ext}"),
                fullname: fnr.unwrap_or("").to_string(),
            };
            print_json(output, &event);
        }
    }
}

/// Emits the end-of-run transfer statistics.
pub fn emit_stats(output: OutputFormat, stats: &HttpStats) {
    let (requests, retries, tx, rx) = (
        stats.requests.load(Ordering::Relaxed),
        stats.retries.load(Ordering::Relaxed),
        stats.bytes_tx.load(Ordering::Relaxed),
        stats.bytes_rx.load(Ordering::Relaxed),
    );
    print_human(
        output,
        &format!(
            "{} Requests: {}; Retries: {}; Sent {} bytes; Received {} bytes",
            "Finished!".white().bold(),
            requests,
            retries,
            tx,
            rx
        ),
    );
    print_json(
        output,
        &StatsEvent {
            kind: "statistics",
            requests,
            retries,
            sentbytes: tx,
            receivedbytes: rx,
        },
    );
}
