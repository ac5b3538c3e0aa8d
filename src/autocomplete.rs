//! Long filename resolution for discovered 8.3 aliases.
//!
//! Candidates come from two sources: a checksum ("rainbow") lookup when the
//! alias looks like `XY1234` and the wordlist carries checksums, and a
//! direct match of the alias against each record's 8.3 parts. Candidates
//! are then verified against the server with one of three strategies:
//! an invalid HTTP method returning 405, a status code absent from samples
//! of non-existent URLs, or a Levenshtein distance jump between response
//! bodies. Verification is serialised per target so two branches cannot
//! claim the same candidate.

use crate::args::AutocompleteMode;
use crate::enumerate::BaseRequest;
use crate::levenshtein;
use crate::probe::escape;
use crate::scanner::{AttackConfig, ScanContext};
use crate::vuln::ALPHANUM;
use crate::wordlist::WordlistRecord;
use log::{info, trace};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

/// Matches aliases of the form 1-2 prefix characters + 4-hex checksum.
static CHECKSUM_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(".{1,2}[0-9A-F]{4}").expect("static regex"));

/// The highest pairwise distance ratio seen for a status code during
/// sampling, and the body it was computed against.
#[derive(Debug, Clone, Default)]
pub struct DistanceSample {
    pub distance: f32,
    pub body: String,
}

/// Response-shape caches keyed by extension, since IIS handlers differ per
/// extension. Compute-once under their mutexes.
#[derive(Debug, Default)]
pub struct Caches {
    status: Mutex<HashMap<String, HashSet<u16>>>,
    distance: Mutex<HashMap<String, HashMap<u16, DistanceSample>>>,
}

/// Attempts to resolve a confirmed alias to one long filename.
///
/// Returns the escaped path of the first candidate that passes the
/// configured verification, after registering it in the found set and
/// checking whether it is a directory (unless recursion is disabled).
pub async fn resolve(ctx: &ScanContext, ac: &AttackConfig, br: &BaseRequest) -> Option<String> {
    let mut candidates = Vec::new();

    // Look up candidates by checksum if the alias looks checksummed and a
    // rainbow table was provided
    if ctx.wordlist.is_rainbow && CHECKSUM_REGEX.is_match(&br.file) {
        candidates.extend(dechecksum(ctx, br));
    }
    candidates.extend(wordlist_candidates(ctx, br));

    let mut seen = HashSet::new();
    candidates.retain(|r| seen.insert(format!("{}{}", r.filename, r.extension)));

    let verify_method = if ac.autocomplete == AutocompleteMode::Method {
        "_"
    } else {
        "GET"
    };

    for candidate in candidates {
        // Serialise verification so concurrent branches cannot both claim
        // the same candidate
        let mut found = ac.found.lock().await;

        let path = escape(&format!("{}{}", candidate.filename, candidate.extension));
        if found.files.contains(&path) {
            continue;
        }

        let res = match ctx.probe.fetch(verify_method, &format!("{}{path}", br.url)).await {
            Ok(res) => res,
            Err(e) => {
                info!("existence check error for {}{path}: {e}", br.url);
                continue;
            }
        };

        let confirmed = match ac.autocomplete {
            // A 405 Method Not Allowed for an invalid method means the
            // file exists; less noisy and often more reliable than the
            // status or distance checks
            AutocompleteMode::Method => res.status == 405,
            AutocompleteMode::Status => {
                let statuses = get_statuses(ctx, ac, &candidate.extension, &br.url).await;
                !statuses.contains(&res.status)
            }
            AutocompleteMode::Distance => {
                let dists = get_distances(ctx, ac, &candidate.extension, &br.url).await;
                match dists.get(&res.status) {
                    None => {
                        info!("autocomplete got a status code hit for {}{path}", br.url);
                        true
                    }
                    Some(sample) => {
                        let ratio = distance_ratio(&sample.body, &res.body);
                        let delta = ratio - sample.distance;
                        if delta > 0.1 {
                            info!(
                                "autocomplete got a distance hit for {}{path} (delta {delta:.3})",
                                br.url
                            );
                        }
                        delta > 0.1
                    }
                }
            }
            AutocompleteMode::Auto | AutocompleteMode::None => false,
        };

        if confirmed {
            found.files.insert(path.clone());

            // Check whether this looks like a directory redirect
            if !ctx.options.norecurse {
                if let Ok(res) = ctx.probe.fetch("HEAD", &format!("{}{path}", br.url)).await {
                    if let Some(location) = res.location() {
                        let wanted = format!("/{}/", path.to_lowercase());
                        if location.to_lowercase().ends_with(&wanted) {
                            found.directories.insert(path.clone());
                        }
                    }
                }
            }

            return Some(path);
        }
    }

    None
}

/// Wordlist records whose 8.3 parts match the discovered alias exactly.
fn wordlist_candidates(ctx: &ScanContext, br: &BaseRequest) -> Vec<WordlistRecord> {
    let ext = &br.ext[br.ext.len().min(1)..];
    let matches: Vec<WordlistRecord> = ctx
        .wordlist
        .records()
        .filter(|r| r.filename83 == br.file && r.extension83 == ext)
        .cloned()
        .collect();

    if !matches.is_empty() {
        info!(
            "autocomplete found {} candidates for {}{}",
            matches.len(),
            br.file,
            br.ext
        );
        trace!("autocomplete candidates: {matches:?}");
    }
    matches
}

/// Reconstitutes checksummed aliases (e.g. `AB1234~1.HTM`) by matching the
/// four-hex suffix against each record's checksum groups and the remaining
/// prefix against the record's name.
fn dechecksum(ctx: &ScanContext, br: &BaseRequest) -> Vec<WordlistRecord> {
    let split = br.file.len().saturating_sub(4);
    if split == 0 {
        return Vec::new();
    }
    let (prefix, checksum) = br.file.split_at(split);
    info!(
        "possible checksummed alias {} (prefix {prefix}, checksum {checksum})",
        br.file
    );

    let matches: Vec<WordlistRecord> = ctx
        .wordlist
        .records()
        .filter(|r| {
            r.checksums
                .as_bytes()
                .chunks(4)
                .any(|group| group == checksum.as_bytes())
                && r.filename.to_uppercase().starts_with(prefix)
                && r.extension.to_uppercase().starts_with(&br.ext)
        })
        .cloned()
        .collect();

    if !matches.is_empty() {
        info!(
            "dechecksum found {} candidates for {}{}",
            matches.len(),
            br.file,
            br.ext
        );
        trace!("dechecksum candidates: {matches:?}");
    }
    matches
}

/// Samples response statuses for random non-existent URLs with the given
/// extension, cached per extension.
async fn get_statuses(
    ctx: &ScanContext,
    ac: &AttackConfig,
    extension: &str,
    base_url: &str,
) -> HashSet<u16> {
    let mut cache = ac.caches.status.lock().await;
    if let Some(statuses) = cache.get(extension) {
        if !statuses.is_empty() {
            return statuses.clone();
        }
    }

    let samples = if ctx.options.stabilise { 12 } else { 2 };
    let mut statuses = HashSet::with_capacity(samples);
    for _ in 0..samples {
        let path = format!("{}{extension}", rand_path());
        if let Ok(res) = ctx.probe.fetch("GET", &format!("{base_url}{path}")).await {
            statuses.insert(res.status);
        }
    }

    info!("got non-existent file statuses for {extension}: {statuses:?}");
    cache.insert(extension.to_string(), statuses.clone());
    statuses
}

/// Samples random non-existent URLs and records, per status code, the
/// highest pairwise Levenshtein ratio between body prefixes. Cached per
/// extension; the compute happens under the cache mutex.
async fn get_distances(
    ctx: &ScanContext,
    ac: &AttackConfig,
    extension: &str,
    base_url: &str,
) -> HashMap<u16, DistanceSample> {
    let mut cache = ac.caches.distance.lock().await;
    if let Some(dists) = cache.get(extension) {
        if !dists.is_empty() {
            return dists.clone();
        }
    }

    info!("sampling responses for Levenshtein distance calculation ({extension})");

    let samples = if ctx.options.stabilise { 24 } else { 4 };
    let mut bodies: HashMap<u16, Vec<String>> = HashMap::new();
    let mut dists: HashMap<u16, DistanceSample> = HashMap::new();

    for _ in 0..samples {
        let path = format!("{}{extension}", rand_path());
        let res = match ctx.probe.fetch("GET", &format!("{base_url}{path}")).await {
            Ok(res) => res,
            Err(_) => continue,
        };

        let prior = bodies.entry(res.status).or_default();
        for sample in prior.iter() {
            let ratio = distance_ratio(sample, &res.body);
            let highest = dists.get(&res.status).map(|d| d.distance);
            if highest.is_none() || ratio > highest.unwrap_or(0.0) {
                dists.insert(
                    res.status,
                    DistanceSample {
                        distance: ratio,
                        body: res.body.clone(),
                    },
                );
            }
        }
        prior.push(res.body);
    }

    for (status, sample) in &dists {
        info!(
            "calculated Levenshtein distance for {extension} status {status}: {:.3}",
            sample.distance
        );
    }

    cache.insert(extension.to_string(), dists.clone());
    dists
}

/// Levenshtein distance between two body prefixes as a fraction of the
/// longer one.
fn distance_ratio(a: &str, b: &str) -> f32 {
    levenshtein::distance(a, b) as f32 / a.len().max(b.len()).max(1) as f32
}

/// A random 8-11 character path built from the alphanumeric pool.
fn rand_path() -> String {
    let mut rng = rand::rng();
    let len = rng.random_range(8..12);
    let pool = ALPHANUM.as_bytes();
    let path: String = (0..len)
        .map(|_| pool[rng.random_range(0..pool.len())] as char)
        .collect();
    escape(&path)
}
