//! Data models for aggregated playlists
//!
//! The grouped shape (`AggregatedConfig` of `ChannelGroup`s) is the primary
//! cache format. `FlatEntry` is the older ungrouped shape, still accepted on
//! read and produced when the cache is configured for it.

use serde::{Deserialize, Serialize};

/// Transport family of a stream, derived from its link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Hls,
    Dash,
    Audio,
    Unknown,
}

impl StreamType {
    /// Classify a link by extension substring, case-insensitively.
    ///
    /// Checked in order: `.m3u8`/`.m3u` is HLS, then `.mpd` is DASH, then
    /// `.mp3` is audio. Anything else is unknown.
    pub fn from_link(link: &str) -> Self {
        let link = link.to_ascii_lowercase();
        if link.contains(".m3u8") || link.contains(".m3u") {
            Self::Hls
        } else if link.contains(".mpd") {
            Self::Dash
        } else if link.contains(".mp3") {
            Self::Audio
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hls => "hls",
            Self::Dash => "dash",
            Self::Audio => "audio",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single playable link inside a channel group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub link: String,
    pub id: String,
    #[serde(rename = "type")]
    pub stream_type: StreamType,
    #[serde(default)]
    pub available: bool,
}

impl StreamRecord {
    /// Build an unvalidated record; the type is derived from the link.
    pub fn new(link: impl Into<String>, id: impl Into<String>) -> Self {
        let link = link.into();
        Self {
            stream_type: StreamType::from_link(&link),
            link,
            id: id.into(),
            available: false,
        }
    }
}

/// Identity of a channel group: entries sharing it merge into one group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub name: String,
    pub logo: String,
    pub group: String,
}

/// Channel group combining same-identity entries from any number of files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelGroup {
    pub name: String,
    pub logo: String,
    pub group: String,
    pub streams: Vec<StreamRecord>,
}

impl ChannelGroup {
    pub fn new(key: GroupKey) -> Self {
        Self {
            name: key.name,
            logo: key.logo,
            group: key.group,
            streams: Vec::new(),
        }
    }
}

/// Ordered result of one aggregation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregatedConfig(Vec<ChannelGroup>);

impl AggregatedConfig {
    pub fn new(groups: Vec<ChannelGroup>) -> Self {
        Self(groups)
    }

    pub fn groups(&self) -> &[ChannelGroup] {
        &self.0
    }

    pub fn groups_mut(&mut self) -> &mut [ChannelGroup] {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of stream records across all groups
    pub fn stream_count(&self) -> usize {
        self.0.iter().map(|group| group.streams.len()).sum()
    }

    pub fn streams(&self) -> impl Iterator<Item = &StreamRecord> {
        self.0.iter().flat_map(|group| group.streams.iter())
    }
}

/// Ungrouped playlist entry, the older cache shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatEntry {
    pub id: String,
    pub logo: String,
    pub group: String,
    pub name: String,
    pub link: String,
    #[serde(default)]
    pub available: bool,
}

/// Anything the validation pass can run over
///
/// Serialized untagged, so a persisted value is the bare JSON array of
/// either shape. On decode the grouped shape is tried first; flat entries
/// have no `streams` field and fall through to the second variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Validatable {
    Groups(AggregatedConfig),
    FlatStreams(Vec<FlatEntry>),
}

impl Validatable {
    /// Number of records a validation pass will probe
    pub fn record_count(&self) -> usize {
        match self {
            Self::Groups(config) => config.stream_count(),
            Self::FlatStreams(entries) => entries.len(),
        }
    }
}

impl From<AggregatedConfig> for Validatable {
    fn from(config: AggregatedConfig) -> Self {
        Self::Groups(config)
    }
}

impl From<Vec<FlatEntry>> for Validatable {
    fn from(entries: Vec<FlatEntry>) -> Self {
        Self::FlatStreams(entries)
    }
}
