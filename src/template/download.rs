use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{Result, StencilError};

const USER_AGENT: &str = concat!("stencil/", env!("CARGO_PKG_VERSION"));

/// Blocking HTTP client shared by archive downloads and registry lookups.
pub fn http_client(timeout: Duration) -> std::result::Result<reqwest::blocking::Client, reqwest::Error> {
    reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Download a `.tar.gz` snapshot and unpack it into `dest`, dropping the
/// archive's top-level directory.
pub fn download_archive(url: &str, dest: &Path) -> Result<()> {
    let download_error = |reason: String| StencilError::Download {
        template: url.to_string(),
        reason,
    };

    let client = http_client(Duration::from_secs(60)).map_err(|e| download_error(e.to_string()))?;
    debug!(%url, "downloading archive");
    let response = client
        .get(url)
        .send()
        .map_err(|e| download_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(download_error(format!("server responded with {status}")));
    }

    unpack_download(url, response, dest)?;
    Ok(())
}

/// Extract a downloaded body, reporting I/O failures as a failed download of `url`.
fn unpack_download(url: &str, body: impl Read, dest: &Path) -> Result<usize> {
    extract_archive(body, dest).map_err(|e| match e {
        StencilError::Io { context, source } => StencilError::Download {
            template: url.to_string(),
            reason: format!("{context}: {source}"),
        },
        other => other,
    })
}

/// Unpack a gzip'd tarball into `dest`, stripping the first path component.
pub fn extract_archive(reader: impl Read, dest: &Path) -> Result<usize> {
    let io_error = |context: String| move |e: std::io::Error| StencilError::Io { context, source: e };

    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let mut unpacked = 0;

    for entry in archive.entries().map_err(io_error("reading archive".into()))? {
        let mut entry = entry.map_err(io_error("reading archive entry".into()))?;
        let path = entry
            .path()
            .map_err(io_error("reading archive entry path".into()))?
            .into_owned();

        let Some(relative) = strip_first_component(&path) else {
            continue;
        };

        let target = dest.join(&relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(io_error(format!("creating {}", parent.display())))?;
        }
        entry
            .unpack(&target)
            .map_err(io_error(format!("unpacking {}", relative.display())))?;
        if entry.header().entry_type().is_file() {
            unpacked += 1;
        }
    }

    debug!(files = unpacked, dest = %dest.display(), "archive extracted");
    Ok(unpacked)
}

/// `repo-abc123/src/main.rs` becomes `src/main.rs`. Entries that would escape
/// the destination, or that are the top-level directory itself, give `None`.
fn strip_first_component(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    components.next()?;

    let mut stripped = PathBuf::new();
    for component in components {
        match component {
            Component::Normal(part) => stripped.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!stripped.as_os_str().is_empty()).then_some(stripped)
}
