//! Track library: the imported tracks, their metadata and their persistence.
//!
//! Tracks are copied into a private media directory on import and listed in
//! import order. The ordered list is stored as JSON in a key-value store.

mod catalog;
mod import;
mod metadata;
mod model;
mod store;

pub use catalog::{Catalog, ImportSummary, TRACKS_KEY};
pub use metadata::{LoftyExtractor, MetadataExtractor, TrackMetadata};
pub use model::{Artwork, Track, TrackRecord};
pub use store::{JsonFileStore, KeyValueStore};
