use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::config;
use crate::library::{Catalog, JsonFileStore, KeyValueStore, LoftyExtractor, MetadataExtractor};

pub const STORE_FILE: &str = "store.json";
pub const MEDIA_DIR: &str = "media";
pub const ART_DIR: &str = "artwork";

/// Open `<data_dir>/store.json` and load the catalog it holds.
pub fn open_catalog(
    data_dir: &Path,
    settings: &config::Settings,
) -> Result<Catalog, Box<dyn std::error::Error>> {
    let store = JsonFileStore::open(data_dir.join(STORE_FILE))?;
    let catalog = Catalog::open(
        store,
        LoftyExtractor,
        data_dir.join(MEDIA_DIR),
        settings.library.clone(),
    )?;
    info!(tracks = catalog.len(), path = %data_dir.display(), "library loaded");
    Ok(catalog)
}

/// Import command-line paths and describe the outcome for the status line.
pub fn import_args<S: KeyValueStore, E: MetadataExtractor>(
    catalog: &mut Catalog<S, E>,
    args: &[PathBuf],
) -> Option<String> {
    if args.is_empty() {
        return None;
    }
    match catalog.import(args) {
        Ok(summary) => Some(format!(
            "Imported {} (duplicates: {}, skipped: {})",
            summary.added, summary.duplicates, summary.skipped
        )),
        Err(e) => {
            error!(error = %e, "import could not be saved");
            Some(format!("Import failed: {e}"))
        }
    }
}
