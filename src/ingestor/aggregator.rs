//! Directory aggregation of playlist files into channel groups
//!
//! Every pass starts from nothing: the result is a projection of whatever
//! playlist files are on disk at the time of the call.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::m3u_parser::{PlaylistParser, RawEntry};
use crate::models::{AggregatedConfig, ChannelGroup, FlatEntry, GroupKey, StreamRecord};

/// File name suffixes treated as playlists
pub const PLAYLIST_EXTENSIONS: [&str; 2] = [".m3u", ".m3u8"];

/// Which parsed entries survive aggregation
///
/// The two cache shapes keep different entries and are not unified:
/// grouped aggregation needs only a link, flat aggregation needs every
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep any entry with a non-empty link
    LinkOnly,
    /// Keep only entries whose id, logo, group, name and link are all set
    AllFields,
}

impl RetentionPolicy {
    pub fn retains(&self, entry: &RawEntry) -> bool {
        match self {
            Self::LinkOnly => !entry.link.is_empty(),
            Self::AllFields => [
                &entry.id,
                &entry.logo,
                &entry.group,
                &entry.name,
                &entry.link,
            ]
            .iter()
            .all(|field| !field.is_empty()),
        }
    }
}

/// Accumulates entries into groups keyed by (name, logo, group)
#[derive(Debug, Default)]
pub struct GroupBuilder {
    index: HashMap<GroupKey, usize>,
    groups: Vec<ChannelGroup>,
}

impl GroupBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to its group, creating the group on first sight.
    /// Entries without a link are ignored.
    pub fn add(&mut self, entry: RawEntry) {
        if entry.link.is_empty() {
            return;
        }
        let key = GroupKey {
            name: entry.name,
            logo: entry.logo,
            group: entry.group,
        };
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                let slot = self.groups.len();
                self.index.insert(key.clone(), slot);
                self.groups.push(ChannelGroup::new(key));
                slot
            }
        };
        self.groups[slot]
            .streams
            .push(StreamRecord::new(entry.link, entry.id));
    }

    /// Deduplicate each group's streams by link and return the groups in
    /// first-seen order.
    pub fn finish(mut self) -> AggregatedConfig {
        let mut duplicates = 0usize;
        for group in &mut self.groups {
            let mut seen = HashSet::new();
            let before = group.streams.len();
            group.streams.retain(|stream| seen.insert(stream.link.clone()));
            duplicates += before - group.streams.len();
        }
        if duplicates > 0 {
            debug!("Removed {} duplicate stream links", duplicates);
        }
        AggregatedConfig::new(self.groups)
    }
}

/// Walks a directory tree and aggregates every playlist found in it
#[derive(Debug, Clone, Default)]
pub struct Aggregator;

impl Aggregator {
    pub fn new() -> Self {
        Self
    }

    /// Build grouped, deduplicated channel groups from all playlists under
    /// `root`. Unreadable files are skipped.
    pub fn aggregate(&self, root: &Path) -> AggregatedConfig {
        let policy = RetentionPolicy::LinkOnly;
        let mut builder = GroupBuilder::new();
        let files = playlist_files(root);

        for path in &files {
            let Some(content) = read_playlist(path) else {
                continue;
            };
            let parser = PlaylistParser::new(&content);
            for entry in parser.entries().filter(|entry| policy.retains(entry)) {
                builder.add(entry);
            }
        }

        let config = builder.finish();
        info!(
            "Aggregated {} channel groups ({} streams) from {} playlist files under {:?}",
            config.len(),
            config.stream_count(),
            files.len(),
            root
        );
        config
    }

    /// Build the ungrouped list used by the flat cache shape. Entries missing
    /// any field are dropped and links are not deduplicated.
    pub fn aggregate_flat(&self, root: &Path) -> Vec<FlatEntry> {
        let policy = RetentionPolicy::AllFields;
        let mut entries = Vec::new();
        let files = playlist_files(root);

        for path in &files {
            let Some(content) = read_playlist(path) else {
                continue;
            };
            let parser = PlaylistParser::new(&content);
            entries.extend(
                parser
                    .entries()
                    .filter(|entry| policy.retains(entry))
                    .map(|entry| FlatEntry {
                        id: entry.id,
                        logo: entry.logo,
                        group: entry.group,
                        name: entry.name,
                        link: entry.link,
                        available: false,
                    }),
            );
        }

        info!(
            "Aggregated {} flat entries from {} playlist files under {:?}",
            entries.len(),
            files.len(),
            root
        );
        entries
    }
}

/// Recursively list playlist files under `root`, sorted by path so the walk
/// order is the same on every call.
pub fn playlist_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let reader = match fs::read_dir(&dir) {
            Ok(reader) => reader,
            Err(e) => {
                warn!("Cannot list directory {:?}: {}", dir, e);
                continue;
            }
        };

        let mut children: Vec<_> = reader.filter_map(Result::ok).collect();
        children.sort_by_key(|child| child.file_name());

        let mut subdirs = Vec::new();
        for child in children {
            let path = child.path();
            let is_dir = child.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                subdirs.push(path);
            } else if is_playlist(&path) {
                files.push(path);
            }
        }
        // Reverse so the stack pops subdirectories in name order
        pending.extend(subdirs.into_iter().rev());
    }

    files
}

fn is_playlist(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| PLAYLIST_EXTENSIONS.iter().any(|ext| name.ends_with(ext)))
}

fn read_playlist(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => {
            debug!("Parsing playlist {:?}", path);
            Some(content)
        }
        Err(e) => {
            warn!("Skipping playlist {:?}: {}", path, e);
            None
        }
    }
}
