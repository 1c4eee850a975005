use std::path::PathBuf;

use directories::ProjectDirs;
use tracing::warn;

/// Directory holding the SQLite database and other runtime files.
///
/// Debug builds keep everything under `dev_assets/` at the repository root so
/// local runs never touch the real data directory.
pub fn asset_dir() -> PathBuf {
    let path = if cfg!(debug_assertions) {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../dev_assets")
    } else {
        match ProjectDirs::from("org", "casedesk", "casedesk") {
            Some(dirs) => dirs.data_dir().to_path_buf(),
            None => {
                warn!("No home directory available, falling back to ./casedesk-data");
                PathBuf::from("casedesk-data")
            }
        }
    };

    if !path.exists() {
        if let Err(e) = std::fs::create_dir_all(&path) {
            warn!("Failed to create asset directory {}: {}", path.display(), e);
        }
    }

    path
}
