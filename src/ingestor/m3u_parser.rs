//! EXTINF playlist parser
//!
//! Scans playlist lines for `#EXTINF:` metadata lines and pairs each one with
//! the first plausible stream link that follows it. Lines between the
//! metadata and the link that do not look like a link are skipped, which
//! keeps the parser tolerant of `#EXTVLCOPT`, `#EXTGRP` and other junk that
//! real-world playlists carry.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Prefix of a line that opens a playlist entry
pub const EXTINF_MARKER: &str = "#EXTINF:";

/// Substrings that mark a line as a candidate stream link
pub const TRANSPORT_MARKERS: [&str; 4] = [".m3u8", ".m3u", ".mp3", ".mpd"];

static TVG_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"tvg-id="([^"]+)""#).expect("tvg-id pattern"));
static TVG_LOGO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"tvg-logo="([^"]+)""#).expect("tvg-logo pattern"));
static GROUP_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"group-title="([^"]+)""#).expect("group-title pattern"));

/// One playlist entry as written in the file, before grouping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub id: String,
    pub logo: String,
    pub group: String,
    pub name: String,
    pub link: String,
}

/// Parser over the lines of a single playlist file
///
/// The parser owns nothing but the line slices; every call to
/// [`PlaylistParser::entries`] starts a fresh scan over the same lines.
#[derive(Debug, Clone)]
pub struct PlaylistParser<'a> {
    lines: Vec<&'a str>,
}

impl<'a> PlaylistParser<'a> {
    /// Split file content into lines. A leading byte-order mark is ignored.
    pub fn new(content: &'a str) -> Self {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        Self {
            lines: content.lines().collect(),
        }
    }

    /// Lazily yield every entry that has a link.
    pub fn entries(&self) -> Entries<'_> {
        Entries {
            lines: &self.lines,
            pos: 0,
        }
    }
}

/// Iterator returned by [`PlaylistParser::entries`]
pub struct Entries<'p> {
    lines: &'p [&'p str],
    pos: usize,
}

impl Entries<'_> {
    /// Scan forward for the link of the entry opened on the previous line.
    ///
    /// Stops at the next metadata line without consuming it, so that line
    /// opens its own entry.
    fn find_link(&mut self) -> Option<String> {
        while self.pos < self.lines.len() {
            let line = self.lines[self.pos];
            if line.starts_with(EXTINF_MARKER) {
                return None;
            }
            self.pos += 1;

            let candidate = line.trim();
            if is_link_candidate(candidate) {
                return Some(candidate.to_string());
            }
        }
        None
    }
}

impl Iterator for Entries<'_> {
    type Item = RawEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.lines.len() {
            let line = self.lines[self.pos];
            self.pos += 1;

            if !line.starts_with(EXTINF_MARKER) {
                continue;
            }

            let line_number = self.pos;
            let mut entry = parse_metadata(line);
            match self.find_link() {
                Some(link) => {
                    entry.link = link;
                    return Some(entry);
                }
                None => {
                    debug!(
                        "Discarding entry '{}' at line {}: no stream link before next entry",
                        entry.name, line_number
                    );
                }
            }
        }
        None
    }
}

/// Extract id, logo, group and display name from an `#EXTINF:` line.
pub fn parse_metadata(line: &str) -> RawEntry {
    RawEntry {
        id: capture(&TVG_ID, line),
        logo: capture(&TVG_LOGO, line),
        group: capture(&GROUP_TITLE, line),
        name: display_name(line),
        link: String::new(),
    }
}

fn capture(pattern: &Regex, line: &str) -> String {
    pattern
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Text after the last comma that is not inside a quoted attribute value.
fn display_name(line: &str) -> String {
    let mut in_quotes = false;
    let mut last_comma = None;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => last_comma = Some(idx),
            _ => {}
        }
    }
    last_comma
        .map(|idx| line[idx + 1..].trim().to_string())
        .unwrap_or_default()
}

/// A trimmed line is a link when it names a known transport and uses HTTP(S).
pub fn is_link_candidate(candidate: &str) -> bool {
    !candidate.is_empty()
        && TRANSPORT_MARKERS
            .iter()
            .any(|marker| candidate.contains(marker))
        && candidate.starts_with("http")
}
