//! Entry point for the tildescan scanner binary.
//! It wires the scan together:
//! - Parsing command-line arguments and configuring log verbosity.
//! - Loading the built-in or user-supplied wordlist / rainbow table.
//! - Building the shared HTTP probe and scan context.
//! - Running the scan and translating failures into exit codes.

use clap::Parser;
use colored::Colorize;
use log::{info, warn};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::sync::Arc;
use tildescan::args::Args;
use tildescan::output;
use tildescan::probe::Probe;
use tildescan::scanner::{self, ScanContext, ScanOptions};
use tildescan::vuln::INVALID_FILENAME_CHARS;
use tildescan::wordlist::{WordlistStore, DEFAULT_WORDLIST};
use tildescan::ScanError;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = match args.verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    output::print_human(args.output, &output::banner());

    // https://docs.microsoft.com/en-us/windows/win32/fileio/naming-a-file
    for c in INVALID_FILENAME_CHARS {
        if args.characters.contains(c) {
            warn!("invalid filename character {c:?}; weird things may happen");
        }
    }

    let wordlist = match &args.wordlist {
        Some(path) => {
            info!("using custom wordlist {path}");
            File::open(path)
                .map_err(ScanError::from)
                .and_then(|f| WordlistStore::load(BufReader::new(f)))
        }
        None => {
            info!("using built-in wordlist");
            WordlistStore::load(Cursor::new(DEFAULT_WORDLIST))
        }
    };
    let wordlist = unwrap_or_fatal(wordlist);

    let probe = unwrap_or_fatal(Probe::new(args.timeout, &args.headers));

    let options = ScanOptions {
        concurrency: args.concurrency,
        output: args.output,
        fullurl: args.fullurl,
        norecurse: args.norecurse,
        stabilise: args.stabilise,
        characters: args.characters.clone(),
        autocomplete: args.autocomplete,
        patience: args.patience,
        isvuln: args.isvuln,
    };
    let ctx = Arc::new(ScanContext::new(probe, wordlist, options));

    if let Err(e) = scanner::scan(ctx, args.urls).await {
        fatal(e);
    }
}

fn unwrap_or_fatal<T>(result: tildescan::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => fatal(e),
    }
}

fn fatal(e: ScanError) -> ! {
    eprintln!("{} {e}", "error:".red().bold());
    std::process::exit(1);
}
