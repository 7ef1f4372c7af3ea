//! Best-effort tag reading for imported files.

use std::path::Path;
use std::time::Duration;

use lofty::picture::PictureType::{CoverBack, CoverFront, Leaflet};
use lofty::prelude::{Accessor, AudioFile, TaggedFileExt};
use tracing::debug;

use super::model::Artwork;

/// What could be read from a file's embedded metadata. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub artwork: Option<Artwork>,
    pub duration: Option<Duration>,
}

/// Reads display metadata from an audio file.
///
/// Implementations never fail: an unreadable or missing file yields an empty
/// [`TrackMetadata`].
pub trait MetadataExtractor {
    fn extract(&self, path: &Path) -> TrackMetadata;
}

/// [`MetadataExtractor`] backed by `lofty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyExtractor;

impl MetadataExtractor for LoftyExtractor {
    fn extract(&self, path: &Path) -> TrackMetadata {
        let tagged = match lofty::read_from_path(path) {
            Ok(t) => t,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no readable metadata");
                return TrackMetadata::default();
            }
        };

        let mut meta = TrackMetadata {
            duration: Some(tagged.properties().duration()),
            ..TrackMetadata::default()
        };

        let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
            return meta;
        };

        meta.title = non_blank(tag.title().as_deref());
        meta.artist = non_blank(tag.artist().as_deref());
        meta.artwork = tag
            .get_picture_type(CoverFront)
            .or_else(|| {
                tag.pictures()
                    .iter()
                    .find(|pic| matches!(pic.pic_type(), CoverFront | CoverBack | Leaflet))
            })
            .or_else(|| tag.pictures().first())
            .map(|pic| {
                Artwork::new(
                    pic.data().to_vec(),
                    pic.mime_type().map(|m| m.as_str().to_string()),
                )
            });

        meta
    }
}

fn non_blank(v: Option<&str>) -> Option<String> {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
