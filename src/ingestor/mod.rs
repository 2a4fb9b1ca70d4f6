//! Playlist ingestion: parsing single files and aggregating directories

pub mod aggregator;
pub mod m3u_parser;

pub use aggregator::{Aggregator, GroupBuilder, RetentionPolicy, playlist_files};
pub use m3u_parser::{PlaylistParser, RawEntry};
