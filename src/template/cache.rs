use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::error::{Result, StencilError};
use crate::settings::Settings;

/// A cached template entry returned by `list_cached()`.
#[derive(Debug)]
pub struct CachedTemplate {
    /// The cache directory name.
    pub key: String,
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

/// Directory name for a template argument: `/` and `:` become `-`.
pub fn cache_key(raw: &str) -> String {
    let key = raw.replace(['/', ':', '\\'], "-");
    if key == "." || key == ".." {
        key.replace('.', "_")
    } else {
        key
    }
}

/// Where the template named `raw` is cached under `settings.cache_dir`.
pub fn entry_path(settings: &Settings, raw: &str) -> PathBuf {
    settings.cache_dir.join(cache_key(raw))
}

/// Move a freshly fetched template into its cache entry, replacing any stale copy.
pub fn store(fetched: tempfile::TempDir, entry: &Path) -> Result<PathBuf> {
    if let Some(parent) = entry.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StencilError::Io {
            context: format!("creating cache directory {}", parent.display()),
            source: e,
        })?;
    }

    if entry.exists() {
        debug!(entry = %entry.display(), "removing stale cache entry");
        std::fs::remove_dir_all(entry).map_err(|e| StencilError::Io {
            context: format!("removing stale cache entry {}", entry.display()),
            source: e,
        })?;
    }

    match std::fs::rename(fetched.path(), entry) {
        Ok(()) => {
            // Already moved; keep TempDir from deleting the new location's source.
            let _ = fetched.keep();
        }
        Err(rename_err) => {
            // rename fails across filesystems; copy instead and let the TempDir clean up.
            debug!(error = %rename_err, "rename into cache failed, copying");
            copy_dir_all(fetched.path(), entry)?;
        }
    }

    Ok(entry.to_path_buf())
}

/// List all cached templates, newest first.
pub fn list_cached(settings: &Settings) -> Result<Vec<CachedTemplate>> {
    let cache_dir = &settings.cache_dir;
    if !cache_dir.exists() {
        return Ok(Vec::new());
    }

    let read_dir = std::fs::read_dir(cache_dir).map_err(|e| StencilError::Io {
        context: format!("reading cache directory {}", cache_dir.display()),
        source: e,
    })?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| StencilError::Io {
            context: "reading cache directory entry".into(),
            source: e,
        })?;

        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        entries.push(CachedTemplate {
            key: entry.file_name().to_string_lossy().into_owned(),
            modified: entry.metadata().and_then(|m| m.modified()).ok(),
            path,
        });
    }

    entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.key.cmp(&b.key)));
    Ok(entries)
}

/// Recursively copy a directory, skipping symlinks.
fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst).map_err(|e| StencilError::Io {
        context: format!("creating directory {}", dst.display()),
        source: e,
    })?;

    for entry in walkdir::WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| StencilError::Io {
            context: format!("walking {}", src.display()),
            source: e.into(),
        })?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| StencilError::Io {
                context: format!("creating directory {}", target.display()),
                source: e,
            })?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target).map_err(|e| StencilError::Io {
                context: format!("copying {}", entry.path().display()),
                source: e,
            })?;
        }
    }
    Ok(())
}
