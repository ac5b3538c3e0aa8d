//! A thin retrying HTTP fetch used by every stage of the scan.
//!
//! Redirects are never followed (directory detection depends on seeing the
//! `Location` header of the first response), TLS verification is disabled,
//! and at most the first 1 KiB of each response body is read so connections
//! can be reused. Process-wide request/byte counters are accumulated for
//! the final statistics line.

use crate::{Result, ScanError};
use log::trace;
use reqwest::header::{HeaderMap, HOST, LOCATION, USER_AGENT};
use reqwest::{Client, Method};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/1337.00 (KHTML, like Gecko) Chrome/1337.0.0.0 Safari/1337.00";

/// How much of a response body is kept (enough for distance sampling).
const BODY_SAMPLE_SIZE: usize = 1024;

/// Transport errors are retried this many times in total.
const MAX_ATTEMPTS: usize = 4;

/// Process-wide transfer counters.
#[derive(Debug, Default)]
pub struct HttpStats {
    pub requests: AtomicUsize,
    pub retries: AtomicUsize,
    pub bytes_tx: AtomicUsize,
    pub bytes_rx: AtomicUsize,
}

/// The first response to a probe: status, headers, and a body prefix.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl ProbeResponse {
    /// The `Location` header, if present and valid UTF-8.
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    /// All values of the named header joined with `, `.
    pub fn header_values(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }
}

/// A pooled HTTP client plus the configured custom headers and counters.
pub struct Probe {
    client: Client,
    headers: Vec<(String, String)>,
    host: Option<String>,
    pub stats: HttpStats,
}

impl Probe {
    /// Builds the probe client.
    ///
    /// Custom headers are `Name: Value` lines; a `Host` header (any case)
    /// sets the request host instead of adding a header. Proxy settings are
    /// picked up from the environment by the client builder.
    pub fn new(timeout_secs: u64, raw_headers: &[String]) -> Result<Self> {
        let mut headers = Vec::new();
        let mut host = None;
        for raw in raw_headers {
            let (name, value) = raw
                .split_once(':')
                .ok_or_else(|| ScanError::InvalidHeader(raw.clone()))?;
            let (name, value) = (name.trim(), value.trim());
            if name.eq_ignore_ascii_case("host") {
                host = Some(value.to_string());
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Probe {
            client,
            headers,
            host,
            stats: HttpStats::default(),
        })
    }

    /// Requests the given URL, retrying transport errors with backoff and
    /// returning the first response (redirects are not followed).
    pub async fn fetch(&self, method: &str, url: &str) -> Result<ProbeResponse> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| ScanError::InvalidMethod(method.to_string()))?;

        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let backoff = Duration::from_secs(2 * (attempt as u64 - 1));
                trace!("fetch failed, retrying in {backoff:?}");
                sleep(backoff).await;
                self.stats.retries.fetch_add(1, Ordering::Relaxed);
            }

            let custom_agent = self
                .headers
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case("user-agent"));

            let mut request = self.client.request(method.clone(), url);
            if !custom_agent {
                request = request.header(USER_AGENT, DEFAULT_USER_AGENT);
            }
            if let Some(host) = &self.host {
                request = request.header(HOST, host.clone());
            }
            for (name, value) in &self.headers {
                request = request.header(name.as_str(), value.as_str());
            }

            match request.send().await {
                Ok(mut res) => {
                    let status = res.status().as_u16();
                    let headers = res.headers().clone();

                    // Read at most the sample size; dropping the rest lets
                    // the pool reuse or recycle the connection
                    let mut body = Vec::with_capacity(BODY_SAMPLE_SIZE);
                    while body.len() < BODY_SAMPLE_SIZE {
                        match res.chunk().await {
                            Ok(Some(chunk)) => {
                                let take = (BODY_SAMPLE_SIZE - body.len()).min(chunk.len());
                                body.extend_from_slice(&chunk[..take]);
                                if take < chunk.len() {
                                    break;
                                }
                            }
                            _ => break,
                        }
                    }
                    let body = String::from_utf8_lossy(&body).into_owned();

                    trace!("fetch {method} {url} -> {status}");
                    self.stats.requests.fetch_add(1, Ordering::Relaxed);
                    self.stats
                        .bytes_tx
                        .fetch_add(self.request_size(&method, url), Ordering::Relaxed);
                    self.stats
                        .bytes_rx
                        .fetch_add(response_size(status, &headers, body.len()), Ordering::Relaxed);

                    return Ok(ProbeResponse {
                        status,
                        headers,
                        body,
                    });
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.expect("at least one attempt was made").into())
    }

    /// Approximate size of the outgoing request dump, headers included.
    fn request_size(&self, method: &Method, url: &str) -> usize {
        let mut n = method.as_str().len() + url.len() + "  HTTP/1.1\r\n\r\n".len();
        n += "User-Agent: \r\n".len() + DEFAULT_USER_AGENT.len();
        if let Some(host) = &self.host {
            n += "Host: \r\n".len() + host.len();
        }
        for (name, value) in &self.headers {
            n += name.len() + value.len() + ": \r\n".len();
        }
        n
    }
}

/// Approximate size of the response dump, headers included.
fn response_size(status: u16, headers: &HeaderMap, body_len: usize) -> usize {
    let mut n = format!("HTTP/1.1 {status}\r\n\r\n").len() + body_len;
    for (name, value) in headers {
        n += name.as_str().len() + value.len() + ": \r\n".len();
    }
    n
}

/// Query-escapes a URL segment with spaces encoded as `%20` rather than `+`
/// (which IIS mishandles in some configurations).
pub fn escape(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}
