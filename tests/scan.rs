//! Integration tests driving the probe, vulnerability detection,
//! enumeration and autocomplete stages against a mock server that mimics
//! the IIS 8.3 wildcard matching behaviour.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tildescan::args::{AutocompleteMode, OutputFormat};
use tildescan::autocomplete::{self, Caches};
use tildescan::enumerate::{enumerate, BaseRequest};
use tildescan::probe::Probe;
use tildescan::scanner::{AttackConfig, Found, ScanContext, ScanOptions};
use tildescan::vuln;
use tildescan::wordlist::WordlistStore;
use tokio::sync::Mutex;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Simulates the IIS short filename matcher: wildcarded requests are
/// matched against the configured 8.3 aliases, exact long names are served,
/// and directory long names answer with a redirect.
struct IisFixture {
    aliases: Vec<&'static str>,
    files: Vec<&'static str>,
    dirs: Vec<&'static str>,
}

impl IisFixture {
    fn new(aliases: Vec<&'static str>, files: Vec<&'static str>, dirs: Vec<&'static str>) -> Self {
        IisFixture {
            aliases,
            files,
            dirs,
        }
    }
}

impl Respond for IisFixture {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let raw = request.url.path().trim_start_matches('/');
        let decoded = raw
            .replace("%3f", "?")
            .replace("%3F", "?")
            .replace("%20", " ");
        let pattern = decoded.strip_suffix('/').unwrap_or(&decoded);

        // An invalid method against an existing file elicits a 405
        if request.method.as_str() == "_" {
            if self.files.iter().any(|f| pattern.eq_ignore_ascii_case(f)) {
                return ResponseTemplate::new(405);
            }
            return not_found();
        }

        for dir in &self.dirs {
            if pattern.eq_ignore_ascii_case(dir) {
                return ResponseTemplate::new(301)
                    .insert_header("Location", format!("/{dir}/").as_str());
            }
        }
        for file in &self.files {
            if pattern.eq_ignore_ascii_case(file) {
                return ResponseTemplate::new(200).set_body_string("file contents");
            }
        }

        if pattern.contains('*') || pattern.contains('?') {
            let pattern: Vec<char> = pattern.chars().collect();
            for alias in &self.aliases {
                let alias: Vec<char> = alias.chars().collect();
                if glob_match(&pattern, &alias) {
                    return ResponseTemplate::new(200).set_body_string("<html>match</html>");
                }
            }
            return not_found();
        }

        if self.aliases.iter().any(|a| pattern.eq_ignore_ascii_case(a)) {
            return ResponseTemplate::new(200);
        }
        not_found()
    }
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_string("<html><body>404 Not Found</body></html>")
}

/// `*` matches any run, `?` exactly one character, case-insensitively.
fn glob_match(pattern: &[char], name: &[char]) -> bool {
    match pattern.first().copied() {
        None => name.is_empty(),
        Some('*') => {
            glob_match(&pattern[1..], name)
                || (!name.is_empty() && glob_match(pattern, &name[1..]))
        }
        Some('?') => !name.is_empty() && glob_match(&pattern[1..], &name[1..]),
        Some(c) => match name.first() {
            Some(n) => c.eq_ignore_ascii_case(n) && glob_match(&pattern[1..], &name[1..]),
            None => false,
        },
    }
}

fn make_context(wordlist: &str, autocomplete: AutocompleteMode, characters: &str) -> Arc<ScanContext> {
    let store = WordlistStore::load(Cursor::new(wordlist)).unwrap();
    let probe = Probe::new(5, &[]).unwrap();
    let options = ScanOptions {
        concurrency: 8,
        output: OutputFormat::Json,
        fullurl: false,
        norecurse: false,
        stabilise: false,
        characters: characters.to_string(),
        autocomplete,
        patience: 0,
        isvuln: false,
    };
    Arc::new(ScanContext::new(probe, store, options))
}

fn make_attack(method: &str, suffix: &str, autocomplete: AutocompleteMode) -> Arc<AttackConfig> {
    Arc::new(AttackConfig {
        method: method.to_string(),
        suffix: suffix.to_string(),
        tildes: vec!["~1".to_string()],
        file_chars: Default::default(),
        ext_chars: Default::default(),
        autocomplete,
        found: Mutex::new(Found::default()),
        caches: Caches::default(),
    })
}

async fn start_fixture(fixture: IisFixture) -> (MockServer, String) {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(fixture)
        .mount(&server)
        .await;
    let url = format!("{}/", server.uri());
    (server, url)
}

#[tokio::test]
async fn detect_commits_markers_for_vulnerable_server() {
    let (_server, url) = start_fixture(IisFixture::new(
        vec!["HELLO~1.ASP"],
        vec!["hello.aspx"],
        vec![],
    ))
    .await;

    let probe = Probe::new(5, &[]).unwrap();
    let setup = vuln::detect(&probe, &url, 0).await.expect("vulnerable");

    assert_eq!(setup.tildes, vec!["~1"]);
    assert_eq!(setup.markers.status_pos, 200);
    assert_eq!(setup.markers.status_neg, 404);
    assert_eq!(setup.suffix, "/");
}

#[tokio::test]
async fn detect_reports_not_vulnerable_when_responses_are_identical() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_string("always the same"))
        .mount(&server)
        .await;

    let probe = Probe::new(5, &[]).unwrap();
    let setup = vuln::detect(&probe, &format!("{}/", server.uri()), 0).await;
    assert!(setup.is_none());
}

#[tokio::test]
async fn enumerates_and_resolves_hidden_alias() {
    let (_server, url) = start_fixture(IisFixture::new(
        vec!["HELLO~1.ASP"],
        vec!["hello.aspx"],
        vec![],
    ))
    .await;

    let ctx = make_context("hello.aspx\n", AutocompleteMode::Status, "HELOASP");

    let setup = vuln::detect(&ctx.probe, &url, 0).await.expect("vulnerable");
    let (file_chars, ext_chars) =
        vuln::discover_charsets(&ctx.probe, &url, &setup, "HELOASP").await;

    let stem_chars = file_chars.get("~1").expect("stem charset discovered");
    for c in ['H', 'E', 'L', 'O'] {
        assert!(stem_chars.contains(c), "missing stem char {c}");
    }
    let ext = ext_chars.get("~1").expect("extension charset discovered");
    for c in ['A', 'S', 'P'] {
        assert!(ext.contains(c), "missing extension char {c}");
    }

    let ac = Arc::new(AttackConfig {
        method: setup.method.clone(),
        suffix: setup.suffix.clone(),
        tildes: setup.tildes.clone(),
        file_chars,
        ext_chars,
        autocomplete: AutocompleteMode::Status,
        found: Mutex::new(Found::default()),
        caches: Caches::default(),
    });

    for tilde in &ac.tildes {
        enumerate(
            ctx.clone(),
            ac.clone(),
            setup.markers,
            BaseRequest {
                url: url.clone(),
                file: String::new(),
                tilde: tilde.clone(),
                ext: String::new(),
            },
        )
        .await;
    }

    let found = ac.found.lock().await;
    assert!(
        found.files.contains("hello.aspx"),
        "resolved files: {:?}",
        found.files
    );

    // The character-by-character search keeps the request count well below
    // a brute-force walk of the name space
    let requests = ctx.probe.stats.requests.load(Ordering::Relaxed);
    assert!(requests < 300, "made {requests} requests");
}

#[tokio::test]
async fn status_mode_resolves_wordlist_candidate() {
    let (_server, url) = start_fixture(IisFixture::new(vec![], vec!["secrets.txt"], vec![])).await;

    let ctx = make_context("secrets.txt\n", AutocompleteMode::Status, "");
    let ac = make_attack("GET", "/", AutocompleteMode::Status);
    let br = BaseRequest {
        url: url.clone(),
        file: "SECRET".to_string(),
        tilde: "~1".to_string(),
        ext: ".TXT".to_string(),
    };

    let resolved = autocomplete::resolve(&ctx, &ac, &br).await;
    assert_eq!(resolved.as_deref(), Some("secrets.txt"));
    assert!(ac.found.lock().await.files.contains("secrets.txt"));

    // A second branch confirming the same alias cannot claim it again
    let again = autocomplete::resolve(&ctx, &ac, &br).await;
    assert!(again.is_none());
}

#[tokio::test]
async fn location_redirect_marks_directory_for_recursion() {
    let (_server, url) = start_fixture(IisFixture::new(vec![], vec![], vec!["admin"])).await;

    let ctx = make_context("admin\n", AutocompleteMode::Status, "");
    let ac = make_attack("GET", "/", AutocompleteMode::Status);
    let br = BaseRequest {
        url: url.clone(),
        file: "ADMIN".to_string(),
        tilde: "~1".to_string(),
        ext: String::new(),
    };

    let resolved = autocomplete::resolve(&ctx, &ac, &br).await;
    assert_eq!(resolved.as_deref(), Some("admin"));

    let found = ac.found.lock().await;
    assert!(found.directories.contains("admin"));
}

#[tokio::test]
async fn method_mode_dechecksums_rainbow_alias() {
    let (_server, url) = start_fixture(IisFixture::new(vec![], vec!["hello.aspx"], vec![])).await;

    // Rainbow record for hello.aspx carrying its case-variant checksums
    let rainbow = "#SHORTSCAN#\n3A19F227F05F\tHELLO\tASP\thello\taspx\n";
    let ctx = make_context(rainbow, AutocompleteMode::Method, "");
    let ac = make_attack("GET", "/", AutocompleteMode::Method);

    // HE + the upper-case variant checksum F227
    let br = BaseRequest {
        url: url.clone(),
        file: "HEF227".to_string(),
        tilde: "~1".to_string(),
        ext: ".ASP".to_string(),
    };

    let resolved = autocomplete::resolve(&ctx, &ac, &br).await;
    assert_eq!(resolved.as_deref(), Some("hello.aspx"));
}
