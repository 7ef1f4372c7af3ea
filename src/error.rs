//! Error types shared across the library and playback subsystems.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the durable key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("store at {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures surfaced by the track catalog.
///
/// Per-file import problems are not errors: they are logged and skipped.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("persisted track list is malformed: {0}")]
    Records(#[from] serde_json::Error),
}

/// Failures of the playback session manager and its audio backend.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("audio output unavailable: {0}")]
    Output(String),
    #[error("seek failed: {0}")]
    Seek(String),
    #[error("failed to start now-playing sync: {0}")]
    Sync(#[source] io::Error),
}
