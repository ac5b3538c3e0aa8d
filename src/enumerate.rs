//! The 8.3 alias enumeration engine.
//!
//! A recursive concurrent search over a tree whose root is an empty stem
//! and extension. Each branch appends one character from the discovered
//! slot charset, probes a wildcarded URL to decide whether the branch is
//! alive, confirms complete names, and recurses while the name continues.
//! The shared semaphore is the single point of backpressure; a branch
//! releases its permit before recursing.

use crate::args::AutocompleteMode;
use crate::autocomplete;
use crate::output;
use crate::probe::escape;
use crate::scanner::{AttackConfig, ScanContext};
use crate::vuln::Markers;
use futures::future::{BoxFuture, FutureExt};
use futures::{stream, StreamExt};
use log::debug;
use std::sync::Arc;

/// The in-flight position in the enumeration search tree.
///
/// `url` always ends in `/`; `file` holds up to six discovered stem
/// characters and `ext` is empty or a dot followed by up to three
/// characters.
#[derive(Debug, Clone)]
pub struct BaseRequest {
    pub url: String,
    pub file: String,
    pub tilde: String,
    pub ext: String,
}

/// Explores every next-character branch of `br` concurrently.
pub fn enumerate(
    ctx: Arc<ScanContext>,
    ac: Arc<AttackConfig>,
    mk: Markers,
    br: BaseRequest,
) -> BoxFuture<'static, ()> {
    async move {
        let ext_mode = !br.ext.is_empty();
        let charset = if ext_mode {
            ac.ext_chars.get(&br.tilde)
        } else {
            ac.file_chars.get(&br.tilde)
        };
        let chars: Vec<char> = charset.map(|s| s.chars().collect()).unwrap_or_default();

        let concurrency = ctx.options.concurrency;
        let branches = chars.into_iter().map(|ch| {
            let ctx = ctx.clone();
            let ac = ac.clone();
            let br = br.clone();
            async move { branch(ctx, ac, mk, br, ch).await }
        });

        stream::iter(branches)
            .buffer_unordered(concurrency)
            .collect::<Vec<()>>()
            .await;
    }
    .boxed()
}

/// Probes a single next-character branch and recurses where the alias
/// continues. HTTP work happens under one semaphore permit, released
/// before any recursion.
async fn branch(ctx: Arc<ScanContext>, ac: Arc<AttackConfig>, mk: Markers, mut br: BaseRequest, ch: char) {
    let ext_mode = !br.ext.is_empty();

    // Workaround for an IIS parser bug which makes the two characters
    // following a percent sign always return a match: pad with ? up to
    // the slot cap so those positions are consumed by wildcards
    let mut part = ch.to_string();
    if ch == '%' {
        let (len, cap): (usize, usize) = if ext_mode {
            (br.ext.len(), 4)
        } else {
            (br.file.len(), 6)
        };
        let pad = cap.saturating_sub(len + 1).min(2);
        for _ in 0..pad {
            part.push('?');
        }
    }
    if ext_mode {
        br.ext.push_str(&part);
    } else {
        br.file.push_str(&part);
    }

    let permit = ctx.semaphore.acquire().await.expect("semaphore closed");

    // Initial wildcard probe for this character
    let url = if ext_mode {
        format!(
            "{}{}{}{}*{}",
            br.url,
            escape(&br.file),
            br.tilde,
            escape(&br.ext),
            ac.suffix
        )
    } else {
        format!(
            "{}{}*{}*{}{}",
            br.url,
            escape(&br.file),
            br.tilde,
            escape(&br.ext),
            ac.suffix
        )
    };
    let alive = matches!(
        ctx.probe.fetch(&ac.method, &url).await,
        Ok(res) if res.status == mk.status_pos
    );
    if !alive {
        return;
    }

    // Check whether this is the full file part
    let full_part_url = format!(
        "{}{}{}*{}{}",
        br.url,
        escape(&br.file),
        br.tilde,
        escape(&br.ext),
        ac.suffix
    );
    let full_part = matches!(
        ctx.probe.fetch(&ac.method, &full_part_url).await,
        Ok(res) if res.status == mk.status_pos
    );

    let mut spawn_ext = false;
    if full_part {
        // Complete-name check, loosened to a negative match because some
        // servers return a different status (e.g. 500) when the full name
        // matches
        let exact_url = format!(
            "{}{}{}{}{}",
            br.url,
            escape(&br.file),
            br.tilde,
            escape(&br.ext),
            ac.suffix
        );
        match ctx.probe.fetch(&ac.method, &exact_url).await {
            Ok(res) if res.status != mk.status_neg => {
                let fnr = if ac.autocomplete != AutocompleteMode::None {
                    autocomplete::resolve(&ctx, &ac, &br).await
                } else {
                    None
                };
                output::emit_result(ctx.options.output, ctx.options.fullurl, &br, fnr.as_deref());
            }
            Ok(res) if !br.ext.is_empty() => {
                debug!(
                    "possible hit on {}{}{} but status {} is the same as a negative match",
                    br.file, br.tilde, br.ext, res.status
                );
            }
            _ => {}
        }

        // Kick off file extension discovery
        spawn_ext = br.ext.is_empty();
    }

    // Check whether the rabbit hole goes deeper
    let mut deeper = false;
    if (ext_mode && br.ext.len() < 4) || (!ext_mode && br.file.len() < 6) {
        let url = if ext_mode {
            format!(
                "{}{}{}{}%3f*{}",
                br.url,
                escape(&br.file),
                br.tilde,
                escape(&br.ext),
                ac.suffix
            )
        } else {
            format!(
                "{}{}%3f*{}*{}{}",
                br.url,
                escape(&br.file),
                br.tilde,
                escape(&br.ext),
                ac.suffix
            )
        };
        deeper = matches!(
            ctx.probe.fetch(&ac.method, &url).await,
            Ok(res) if res.status != mk.status_neg
        );
    }

    drop(permit);

    if spawn_ext {
        let mut next = br.clone();
        next.ext = ".".to_string();
        enumerate(ctx.clone(), ac.clone(), mk, next).await;
    }
    if deeper {
        enumerate(ctx, ac, mk, br).await;
    }
}
