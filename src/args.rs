//! Command-line arguments for the scanner binary.
//! Parsing and validation are handled by the `clap` crate.

use crate::vuln::DEFAULT_CHARACTERS;
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable, colourised output
    Human,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AutocompleteMode {
    /// Pick method- or status-based checks at preflight
    Auto,
    /// HTTP method magic (an invalid method returning 405 means the file exists)
    Method,
    /// Compare against statuses sampled from non-existent URLs
    Status,
    /// Levenshtein distance of response bodies
    Distance,
    /// Disable autocompletion
    None,
}

/// An IIS short filename enumeration scanner.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// URL to scan (multiple URLs can be specified)
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Combined wordlist + rainbow table generated with tildeutil
    #[arg(short, long, value_name = "FILE")]
    pub wordlist: Option<String>,

    /// Header to send with each request (use multiple times for multiple headers)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Number of requests to make at once
    #[arg(short, long, default_value_t = 20)]
    pub concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(short, long, value_name = "SECONDS", default_value_t = 10)]
    pub timeout: u64,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,

    /// How much noise to make (0 = quiet; 1 = debug; 2 = trace)
    #[arg(short, long, default_value_t = 0)]
    pub verbosity: u8,

    /// Display the full URL for confirmed files rather than just the filename
    #[arg(short = 'F', long)]
    pub fullurl: bool,

    /// Don't detect and recurse into subdirectories
    #[arg(short = 'n', long)]
    pub norecurse: bool,

    /// Attempt to get coherent autocomplete results from an unstable server
    /// (generates more requests)
    #[arg(short, long)]
    pub stabilise: bool,

    /// Patience level when determining vulnerability (0 = patient; 1 = very patient)
    #[arg(short, long, value_name = "LEVEL", default_value_t = 0)]
    pub patience: u8,

    /// Filename characters to enumerate
    #[arg(short = 'C', long, default_value = DEFAULT_CHARACTERS)]
    pub characters: String,

    /// Autocomplete detection mode
    #[arg(short, long, value_enum, value_name = "MODE", default_value_t = AutocompleteMode::Auto)]
    pub autocomplete: AutocompleteMode,

    /// Bail after determining whether the service is vulnerable
    #[arg(long)]
    pub isvuln: bool,
}
