use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::LibrarySettings;

pub(super) fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let exts: Vec<String> = settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

/// Turn the user's picks into a flat list of audio files.
///
/// Directories are walked recursively. Anything else is taken as a file
/// candidate and kept when its extension is permitted, even if it does not
/// exist (staging reports that). Returns the files and the number rejected.
pub(super) fn expand_candidates(
    candidates: &[PathBuf],
    settings: &LibrarySettings,
) -> (Vec<PathBuf>, usize) {
    let mut files = Vec::new();
    let mut rejected = 0;

    for candidate in candidates {
        let candidate = fs::canonicalize(candidate).unwrap_or_else(|_| candidate.clone());

        if candidate.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(&candidate)
                .follow_links(settings.follow_links)
                .into_iter()
                .filter_map(Result::ok)
                .map(|e| e.into_path())
                .filter(|p| p.is_file() && is_audio_file(p, settings))
                .collect();
            found.sort();
            files.extend(found);
        } else if is_audio_file(&candidate, settings) {
            files.push(candidate);
        } else {
            debug!(path = %candidate.display(), "not a permitted audio type");
            rejected += 1;
        }
    }

    (files, rejected)
}

/// Where `source` lives once imported.
///
/// Files keep their name, grouped by a digest of the directory they came
/// from, so one source path always maps to one destination while equal file
/// names from different directories do not collide.
pub(super) fn staging_path(media_dir: &Path, source: &Path) -> PathBuf {
    let parent = source.parent().unwrap_or_else(|| Path::new(""));
    let digest = format!("{:x}", md5::compute(parent.to_string_lossy().as_bytes()));
    let file_name = source
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "track".into());
    media_dir.join(&digest[..12]).join(file_name)
}

/// Hidden sibling of `dest` that receives the bytes while copying.
pub(super) fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track".to_string());
    dest.with_file_name(format!(".{name}.part"))
}

/// Copy `source` to `dest`, creating the destination directory.
///
/// The copy lands under [`partial_path`] first and is renamed into place
/// once complete, so `dest` never exists half-written. A stale partial file
/// from an earlier attempt is overwritten.
pub(super) fn stage_file(source: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = partial_path(dest);
    let copied = fs::copy(source, &partial).and_then(|_| fs::rename(&partial, dest));
    if copied.is_err() {
        let _ = fs::remove_file(&partial);
    }
    copied
}
