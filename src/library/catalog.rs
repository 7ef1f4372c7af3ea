use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::LibrarySettings;
use crate::error::CatalogError;

use super::import::{expand_candidates, stage_file, staging_path};
use super::metadata::{LoftyExtractor, MetadataExtractor};
use super::model::{Track, TrackRecord, default_title};
use super::store::{JsonFileStore, KeyValueStore};

/// Key under which the ordered track list is stored.
pub const TRACKS_KEY: &str = "tracks";

/// Outcome counts of one [`Catalog::import`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub duplicates: usize,
    /// Files that could not be staged or were not a permitted audio type.
    pub skipped: usize,
}

/// The ordered, persisted library of imported tracks.
pub struct Catalog<S = JsonFileStore, E = LoftyExtractor> {
    pub(super) tracks: Vec<Track>,
    pub(super) store: S,
    pub(super) extractor: E,
    media_dir: PathBuf,
    settings: LibrarySettings,
}

impl<S: KeyValueStore, E: MetadataExtractor> Catalog<S, E> {
    /// An empty catalog; call [`Catalog::load`] to read persisted tracks.
    pub fn new(
        store: S,
        extractor: E,
        media_dir: impl Into<PathBuf>,
        settings: LibrarySettings,
    ) -> Self {
        Self {
            tracks: Vec::new(),
            store,
            extractor,
            media_dir: media_dir.into(),
            settings,
        }
    }

    /// Construct and load in one step.
    pub fn open(
        store: S,
        extractor: E,
        media_dir: impl Into<PathBuf>,
        settings: LibrarySettings,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::new(store, extractor, media_dir, settings);
        catalog.load()?;
        Ok(catalog)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Index of the track stored at `path`.
    pub fn position_of(&self, path: &Path) -> Option<usize> {
        self.tracks.iter().position(|t| t.path == path)
    }

    /// Copy `candidates` into the media directory and append the new tracks.
    ///
    /// A file that cannot be staged is logged and skipped; the rest of the
    /// batch still goes through. Only failing to persist the result is an error.
    pub fn import(&mut self, candidates: &[PathBuf]) -> Result<ImportSummary, CatalogError> {
        let (files, rejected) = expand_candidates(candidates, &self.settings);
        let mut summary = ImportSummary {
            skipped: rejected,
            ..ImportSummary::default()
        };

        for source in files {
            let dest = staging_path(&self.media_dir, &source);
            if !dest.exists() {
                if let Err(e) = stage_file(&source, &dest) {
                    warn!(source = %source.display(), error = %e, "failed to copy file, skipping");
                    summary.skipped += 1;
                    continue;
                }
                debug!(source = %source.display(), dest = %dest.display(), "staged");
            }

            let meta = self.extractor.extract(&dest);
            let track = Track::new(
                dest,
                meta.title.unwrap_or_else(|| default_title(&source)),
                meta.artist.unwrap_or_default(),
                meta.artwork,
            );

            if self.tracks.contains(&track) {
                summary.duplicates += 1;
                continue;
            }
            self.tracks.push(track);
            summary.added += 1;
        }

        self.save()?;
        info!(
            added = summary.added,
            duplicates = summary.duplicates,
            skipped = summary.skipped,
            "import finished"
        );
        Ok(summary)
    }

    /// Remove the tracks at `indices` (positions before removal) and persist.
    ///
    /// Out-of-range and repeated indices are ignored. Returns the removed
    /// tracks in library order.
    pub fn delete(&mut self, indices: &[usize]) -> Result<Vec<Track>, CatalogError> {
        let mut indices: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < self.tracks.len())
            .collect();
        indices.sort_unstable();
        indices.dedup();

        let mut removed: Vec<Track> = indices
            .iter()
            .rev()
            .map(|&i| self.tracks.remove(i))
            .collect();
        removed.reverse();

        if self.settings.delete_files {
            for track in &removed {
                self.remove_staged_copy(&track.path);
            }
        }

        self.save()?;
        Ok(removed)
    }

    /// Replace the in-memory list with the persisted one.
    ///
    /// Title and artist come from the stored record; artwork is re-read from
    /// the file and is simply absent when the file is gone.
    pub fn load(&mut self) -> Result<(), CatalogError> {
        let records: Vec<TrackRecord> = match self.store.get(TRACKS_KEY)? {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };

        self.tracks = records
            .into_iter()
            .map(|record| {
                let path = record.path().to_path_buf();
                let artwork = self.extractor.extract(&path).artwork;
                Track::new(path, record.title, record.artist, artwork)
            })
            .collect();

        debug!(count = self.tracks.len(), "catalog loaded");
        Ok(())
    }

    /// Overwrite the persisted track list with the in-memory one.
    pub fn save(&mut self) -> Result<(), CatalogError> {
        let records: Vec<TrackRecord> = self.tracks.iter().map(Track::to_record).collect();
        let json = serde_json::to_string(&records)?;
        self.store.set(TRACKS_KEY, &json)?;
        Ok(())
    }

    fn remove_staged_copy(&self, path: &Path) {
        // Only files we copied in ourselves.
        if !path.starts_with(&self.media_dir) {
            return;
        }
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove imported file");
        }
    }
}
