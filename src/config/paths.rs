//! Canonical paths for kobo-highlights.
//!
//! Single source of truth - import this instead of hardcoding paths.
//!
//! ## Device mount points
//!
//! | Platform | Mount point |
//! |----------|-------------|
//! | macOS | `/Volumes/KOBOeReader` |
//! | Linux (udisks) | `/media/<user>/KOBOeReader`, `/run/media/<user>/KOBOeReader` |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Directory searched for in the current directory and its parents
pub const CONFIG_DIR: &str = ".kobo-highlights";

/// Config file inside [`CONFIG_DIR`]
pub const CONFIG_FILE: &str = "config.yaml";

/// Volume label of a mounted Kobo
pub const KOBO_VOLUME: &str = "KOBOeReader";

/// Database location relative to the device root
pub const KOBO_DATABASE: &str = ".kobo/KoboReader.sqlite";

/// Default folder for exported documents (~/kobo-highlights)
pub fn default_storage_folder() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Failed to determine home directory")?
        .join("kobo-highlights"))
}

/// Places a mounted device's database usually shows up
pub fn kobo_database_candidates() -> Vec<PathBuf> {
    let mut roots = vec![PathBuf::from("/Volumes").join(KOBO_VOLUME)];

    if let Some(user) = std::env::var_os("USER") {
        roots.push(PathBuf::from("/media").join(&user).join(KOBO_VOLUME));
        roots.push(PathBuf::from("/run/media").join(&user).join(KOBO_VOLUME));
    }

    roots.into_iter().map(|root| database_under(&root)).collect()
}

/// Database path below a device root
pub fn database_under(root: &Path) -> PathBuf {
    root.join(KOBO_DATABASE)
}

/// First candidate database that exists
pub fn find_kobo_database() -> Option<PathBuf> {
    kobo_database_candidates().into_iter().find(|p| p.is_file())
}
