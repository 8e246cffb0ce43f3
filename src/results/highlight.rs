//! Highlight markup in server snippets
//!
//! Full-text search returns titles and excerpts with the matched terms wrapped
//! in `<em>` (or similar) tags. Only a small set of inline emphasis tags is
//! honoured; every other tag is dropped and its text kept.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)[^>]*>").expect("valid tag regex"));

const EMPHASIS_TAGS: &[&str] = &["em", "mark", "strong", "b", "i", "u"];

/// A run of text that is either emphasized or plain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub emphasized: bool,
}

/// Split highlighted markup into plain/emphasized runs
pub fn parse(markup: &str) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut depth = 0usize;
    let mut last = 0;

    for cap in TAG_RE.captures_iter(markup) {
        let Some(whole) = cap.get(0) else { continue };
        push(&mut segments, &markup[last..whole.start()], depth > 0);
        last = whole.end();

        let tag = cap[2].to_lowercase();
        if !EMPHASIS_TAGS.contains(&tag.as_str()) {
            continue;
        }
        if cap[1].is_empty() {
            depth += 1;
        } else {
            depth = depth.saturating_sub(1);
        }
    }
    push(&mut segments, &markup[last..], depth > 0);

    segments
}

/// Plain text with all markup removed
pub fn strip(markup: &str) -> String {
    parse(markup).into_iter().map(|s| s.text).collect()
}

fn push(segments: &mut Vec<Segment>, raw: &str, emphasized: bool) {
    if raw.is_empty() {
        return;
    }
    let text = decode_entities(raw);
    match segments.last_mut() {
        Some(last) if last.emphasized == emphasized => last.text.push_str(&text),
        _ => segments.push(Segment { text, emphasized }),
    }
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
