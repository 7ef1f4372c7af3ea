use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Embedded cover art kept in memory, still encoded (JPEG, PNG, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub data: Arc<[u8]>,
    pub mime_type: Option<String>,
}

impl Artwork {
    pub fn new(data: impl Into<Arc<[u8]>>, mime_type: Option<String>) -> Self {
        Self {
            data: data.into(),
            mime_type,
        }
    }
}

/// An imported audio item.
///
/// `id` is minted on every construction and is not part of equality: two
/// tracks are the same track iff they point at the same file.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: Uuid,
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    pub artwork: Option<Artwork>,
}

impl Track {
    pub fn new(
        path: impl Into<PathBuf>,
        title: impl Into<String>,
        artist: impl Into<String>,
        artwork: Option<Artwork>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            title: title.into(),
            artist: artist.into(),
            artwork,
        }
    }

    /// `Artist - Title`, or just the title when the artist is blank.
    pub fn display(&self) -> String {
        make_display(&self.title, &self.artist)
    }

    pub(crate) fn to_record(&self) -> TrackRecord {
        TrackRecord {
            url: self.path.to_string_lossy().into_owned(),
            title: self.title.clone(),
            artist: self.artist.clone(),
        }
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Track {}

/// The durable subset of a [`Track`], as stored in the track list JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub url: String,
    pub title: String,
    pub artist: String,
}

impl TrackRecord {
    pub fn path(&self) -> &Path {
        Path::new(&self.url)
    }
}

pub(crate) fn make_display(title: &str, artist: &str) -> String {
    let artist = artist.trim();
    if artist.is_empty() {
        title.to_string()
    } else {
        format!("{} - {}", artist, title)
    }
}

/// Fallback title for a file without a usable title tag.
pub(crate) fn default_title(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("UNKNOWN")
        .to_string()
}
