//! Core library for the tildescan IIS short filename enumeration tools.
//!
//! The scanner pipeline lives in [`scanner`], which drives per-URL
//! vulnerability probing ([`vuln`]), character discovery and recursive
//! 8.3 alias enumeration ([`enumerate`]), and long-filename resolution
//! ([`autocomplete`]). The [`checksum`] and [`wordlist`] modules are shared
//! with the `tildeutil` binary.

pub mod args;
pub mod autocomplete;
pub mod checksum;
pub mod enumerate;
pub mod levenshtein;
pub mod output;
pub mod probe;
pub mod scanner;
pub mod vuln;
pub mod wordlist;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid header (expected \"Name: Value\"): {0}")]
    InvalidHeader(String),

    #[error("invalid HTTP method token: {0}")]
    InvalidMethod(String),

    #[error("invalid wordlist entry (incorrect tab count): {0}")]
    WordlistEntry(String),

    #[error("checksum input must be at least two bytes long")]
    ChecksumInput,

    #[error("unable to access server: {0}")]
    Preflight(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
