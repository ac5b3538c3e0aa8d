//! Wordlist and rainbow table handling.
//!
//! A plain wordlist is one long filename per line; an 8.3 stem and
//! extension are computed for each entry at load time. A rainbow table
//! (generated with `tildeutil wordlist`) is a wordlist pre-augmented with
//! short-name checksums so a leaked checksum alias can be reversed to a
//! long name. The two formats share the [`WordlistRecord`] shape and are
//! distinguished by a magic first line.

use crate::checksum;
use crate::{Result, ScanError};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::io::BufRead;

/// First line of a rainbow table.
pub const RAINBOW_MAGIC: &str = "#SHORTSCAN#";

/// Built-in wordlist used when no `-w` override is given.
pub const DEFAULT_WORDLIST: &str = include_str!("../resources/wordlist.txt");

/// Strips anything that looks like a URL parameter from an ingested word.
static PARAM_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new("[?;#&\r\n]").expect("static regex"));

/// A long-name candidate, immutable after load.
///
/// `extension` carries its leading dot when present; `extension83` never
/// does. `checksums` is empty for plain wordlist entries, otherwise a
/// concatenation of one or more four-hex-digit checksums (one per case
/// variant of the original name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordlistRecord {
    pub checksums: String,
    pub filename: String,
    pub extension: String,
    pub filename83: String,
    pub extension83: String,
}

/// An in-memory table of long-name records, shared read-only once loaded.
#[derive(Debug, Default)]
pub struct WordlistStore {
    pub records: Vec<WordlistRecord>,
    pub is_rainbow: bool,
}

impl WordlistStore {
    /// Reads a wordlist or rainbow table from a line-oriented stream.
    ///
    /// Blank lines and `#` comments are skipped. If the first non-blank
    /// line is exactly [`RAINBOW_MAGIC`] the stream is parsed as a rainbow
    /// table and a malformed line is a fatal error.
    pub fn load(reader: impl BufRead) -> Result<Self> {
        let mut store = WordlistStore::default();
        let mut first = true;

        for line in reader.lines() {
            let line = line?;

            if first && !line.is_empty() {
                first = false;
                if line == RAINBOW_MAGIC {
                    store.is_rainbow = true;
                    info!("rainbow table provided, enabling auto dechecksumming");
                    continue;
                }
            }

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let record = if store.is_rainbow {
                parse_rainbow_line(&line)?
            } else {
                parse_plain_line(&line)
            };
            store.records.push(record);
        }

        Ok(store)
    }

    pub fn records(&self) -> impl Iterator<Item = &WordlistRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parses a five-field tab-separated rainbow table line:
/// `checksums, filename83, extension83, filename, extension`.
fn parse_rainbow_line(line: &str) -> Result<WordlistRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 5 {
        return Err(ScanError::WordlistEntry(line.to_string()));
    }

    // The rainbow format stores extensions without their dot
    let extension = if fields[4].is_empty() {
        String::new()
    } else {
        format!(".{}", fields[4])
    };

    Ok(WordlistRecord {
        checksums: fields[0].to_string(),
        filename: fields[3].to_string(),
        extension,
        filename83: fields[1].to_string(),
        extension83: fields[2].to_string(),
    })
}

/// Parses a plain wordlist line, splitting on the last dot (unless the
/// name starts with a dot) and deriving the 8.3 parts.
fn parse_plain_line(line: &str) -> WordlistRecord {
    match line.rfind('.') {
        Some(p) if p > 0 && !line.starts_with('.') => {
            let (f, e) = (&line[..p], &line[p..]);
            let (_, f83, e83) = checksum::gen8dot3(f, e);
            WordlistRecord {
                checksums: String::new(),
                filename: f.to_string(),
                extension: e.to_string(),
                filename83: f83,
                extension83: e83,
            }
        }
        _ => {
            let (_, f83, _) = checksum::gen8dot3(line, "");
            WordlistRecord {
                checksums: String::new(),
                filename: line.to_string(),
                extension: String::new(),
                filename83: f83,
                extension83: String::new(),
            }
        }
    }
}

/// Turns a raw wordlist into checksummed records for rainbow table output.
///
/// Each line is URL-unescaped twice, reduced to its base name, stripped of
/// parameters and whitespace, and split into stem and extension. Lines that
/// would not be shortened by Windows are dropped. When `variants` is set,
/// checksums for the raw, lower, upper and title-case forms of the name are
/// generated (deduplicated, concatenated in set order).
pub fn ingest(reader: impl BufRead, variants: bool) -> Result<Vec<WordlistRecord>> {
    let mut records = Vec::new();

    for line in reader.lines() {
        let line = line?;

        let w = unescape_twice(&line);
        let w = w.rsplit('/').next().unwrap_or(&w);
        let w = PARAM_REGEX.splitn(w, 2).next().unwrap_or(w);
        let w = w.trim().replace('\t', "");

        // Split the file and extension (case is retained; checksums differ);
        // a name starting with a dot has no extension
        let (f, e) = match w.rfind('.') {
            Some(p) if p > 0 && !w.starts_with('.') => (&w[..p], &w[p + 1..]),
            _ => (w.as_str(), ""),
        };

        let (shortened, f83, e83) = checksum::gen8dot3(f, e);

        // Skip the word if Windows wouldn't generate a short filename
        if !shortened {
            continue;
        }

        let mut checksums = String::new();
        if variants {
            let mut set = HashSet::new();
            set.insert(checksum::checksum(&w));
            set.insert(checksum::checksum(&w.to_lowercase()));
            set.insert(checksum::checksum(&w.to_uppercase()));
            set.insert(checksum::checksum(&title_case(&w)));
            for v in set {
                checksums.push_str(&v);
            }
        }

        records.push(WordlistRecord {
            checksums,
            filename: f.to_string(),
            extension: e.to_string(),
            filename83: f83,
            extension83: e83,
        });
    }

    Ok(records)
}

fn unescape_twice(s: &str) -> String {
    let once = urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string());
    urlencoding::decode(&once)
        .map(|c| c.into_owned())
        .unwrap_or(once)
}

/// Title-cases a name: the first letter of each maximal run of ASCII
/// letters is upper-cased and the rest of the run lower-cased
/// (`hELLO-wOrld.txt` becomes `Hello-World.Txt`).
pub(crate) fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_ascii_alphabetic() {
            if in_word {
                out.push(c.to_ascii_lowercase());
            } else {
                out.push(c.to_ascii_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
