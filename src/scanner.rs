//! Per-URL pipeline orchestration.
//!
//! Drives the scan for each target URL in turn: preflight, vulnerability
//! probing, character-set discovery, enumeration, and recursion into any
//! subdirectories discovered along the way. Newly found directories are
//! prepended to the queue so recursion is depth-first.

use crate::args::{AutocompleteMode, OutputFormat};
use crate::autocomplete::Caches;
use crate::enumerate::{enumerate, BaseRequest};
use crate::output::{self, print_human, print_json, StatusEvent, SEPARATOR};
use crate::probe::Probe;
use crate::vuln;
use crate::wordlist::WordlistStore;
use crate::{Result, ScanError};
use colored::Colorize;
use futures::future::join_all;
use log::info;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use url::Url;

/// Scan-wide settings distilled from the command line.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub concurrency: usize,
    pub output: OutputFormat,
    pub fullurl: bool,
    pub norecurse: bool,
    pub stabilise: bool,
    pub characters: String,
    pub autocomplete: AutocompleteMode,
    pub patience: u8,
    pub isvuln: bool,
}

/// Shared state for the whole run: the HTTP probe, the concurrency bound,
/// and the loaded wordlist.
pub struct ScanContext {
    pub probe: Probe,
    pub semaphore: Semaphore,
    pub wordlist: WordlistStore,
    pub options: ScanOptions,
}

impl ScanContext {
    pub fn new(probe: Probe, wordlist: WordlistStore, options: ScanOptions) -> Self {
        ScanContext {
            probe,
            semaphore: Semaphore::new(options.concurrency),
            wordlist,
            options,
        }
    }
}

/// Names confirmed for one target URL.
#[derive(Debug, Default)]
pub struct Found {
    pub files: HashSet<String>,
    pub directories: HashSet<String>,
}

/// Per-URL attack state: the committed probe tuple, the discovered slot
/// charsets, and everything confirmed so far.
pub struct AttackConfig {
    pub method: String,
    pub suffix: String,
    pub tildes: Vec<String>,
    pub file_chars: HashMap<String, String>,
    pub ext_chars: HashMap<String, String>,
    pub autocomplete: AutocompleteMode,
    pub found: Mutex<Found>,
    pub caches: Caches,
}

/// Normalises a target to carry a scheme and exactly one trailing slash.
pub fn normalise_url(url: &str) -> String {
    let mut url = url.trim_end_matches('/').to_string();
    if !url.contains("://") {
        url = format!("https://{url}");
    }
    url.push('/');
    url
}

/// Scans each URL in the queue, recursing into discovered directories
/// before moving on to the next user-supplied target.
pub async fn scan(ctx: Arc<ScanContext>, urls: Vec<String>) -> Result<()> {
    let output = ctx.options.output;
    let mut queue: VecDeque<String> = urls.into_iter().collect();
    let mut autocomplete_mode = ctx.options.autocomplete;

    while let Some(next) = queue.pop_front() {
        let url = normalise_url(&next);
        Url::parse(&url)?;

        // Pre-flight: check that the server is accessible
        let res = ctx
            .probe
            .fetch("GET", &format!("{url}.aspx"))
            .await
            .map_err(|e| ScanError::Preflight(e.to_string()))?;

        let mut server = res
            .header_values("server")
            .unwrap_or_else(|| "<unknown>".to_string());
        if let Some(v) = res.header_values("x-aspnet-version") {
            server.push_str(&format!(" (ASP.NET v{v})"));
        }

        print_human(output, &format!("\n{SEPARATOR}"));
        print_human(output, &format!("{} {url}", "URL:".white().bold()));
        let mut server_display = server.clone();
        if server != "<unknown>" && !server.contains("IIS") && !server.contains("ASP") {
            server_display.push_str(&format!(" {}", "[!]".bright_red()));
        }
        print_human(output, &format!("{} {server_display}", "Running:".white().bold()));

        // Resolve the autocomplete strategy once: a valid URL with an
        // invalid HTTP method returning 405 Method Not Allowed gives a
        // reliable existence check
        if autocomplete_mode == AutocompleteMode::Auto {
            autocomplete_mode = match ctx.probe.fetch("_", &url).await {
                Ok(res) if res.status == 405 => {
                    info!("using method-based file existence checks");
                    AutocompleteMode::Method
                }
                _ => {
                    info!("using status-based file existence checks");
                    AutocompleteMode::Status
                }
            };
        }

        // First stage: check whether the server is vulnerable
        let setup = vuln::detect(&ctx.probe, &url, ctx.options.patience).await;
        print_json(
            output,
            &StatusEvent {
                kind: "status",
                url: url.clone(),
                server: server.clone(),
                vulnerable: setup.is_some(),
            },
        );

        let Some(setup) = setup else {
            print_human(
                output,
                &format!(
                    "{} {} (or no 8.3 files exist)",
                    "Vulnerable:".white().bold(),
                    "No".bright_blue()
                ),
            );
            print_human(output, SEPARATOR);
            continue;
        };

        print_human(
            output,
            &format!("{} {}", "Vulnerable:".white().bold(), "Yes!".bright_red()),
        );
        print_human(output, SEPARATOR);
        info!(
            "found working options: method {} suffix {:?} statusPos {} statusNeg {}",
            setup.method, setup.suffix, setup.markers.status_pos, setup.markers.status_neg
        );
        info!("found tilde files: {:?}", setup.tildes);

        // Bail here if we're just running a vulnerability check
        if ctx.options.isvuln {
            continue;
        }

        // Second stage: find out which characters are in use
        let (file_chars, ext_chars) =
            vuln::discover_charsets(&ctx.probe, &url, &setup, &ctx.options.characters).await;
        info!("built character set: files {file_chars:?} extensions {ext_chars:?}");

        // Third stage: enumerate all the things
        let markers = setup.markers;
        let ac = Arc::new(AttackConfig {
            method: setup.method,
            suffix: setup.suffix,
            tildes: setup.tildes,
            file_chars,
            ext_chars,
            autocomplete: autocomplete_mode,
            found: Mutex::new(Found::default()),
            caches: Caches::default(),
        });

        let roots = ac.tildes.iter().map(|tilde| {
            enumerate(
                ctx.clone(),
                ac.clone(),
                markers,
                BaseRequest {
                    url: url.clone(),
                    file: String::new(),
                    tilde: tilde.clone(),
                    ext: String::new(),
                },
            )
        });
        join_all(roots).await;

        // Prepend discovered directories for depth-first recursion
        let found = ac.found.lock().await;
        for dir in &found.directories {
            queue.push_front(format!("{url}{dir}/"));
        }

        print_human(output, SEPARATOR);
    }

    print_human(output, "");
    output::emit_stats(output, &ctx.probe.stats);
    Ok(())
}
