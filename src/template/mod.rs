pub mod cache;
pub mod clone;
pub mod download;
pub mod source;

use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::error::{Result, StencilError};
use crate::settings::Settings;

pub use cache::{list_cached, CachedTemplate};
pub use source::{parse_remote, resolve_source, RemoteTemplate, TemplateSource};

#[derive(Debug, Default, Clone, Copy)]
pub struct FetchOptions {
    /// Use `git clone` instead of downloading an archive.
    pub clone: bool,
    /// Use the cached copy and never touch the network.
    pub offline: bool,
}

/// How the template directory was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Cached,
    Fetched,
}

#[derive(Debug)]
pub struct FetchedTemplate {
    pub dir: PathBuf,
    pub origin: Origin,
}

/// Produce a local directory for `source`, downloading or cloning remote
/// templates into the cache unless running offline.
pub fn fetch(source: &TemplateSource, options: FetchOptions, settings: &Settings) -> Result<FetchedTemplate> {
    let remote = match source {
        TemplateSource::Local(path) => {
            return Ok(FetchedTemplate {
                dir: path.clone(),
                origin: Origin::Local,
            })
        }
        TemplateSource::Remote(remote) => remote,
    };

    let entry = cache::entry_path(settings, &remote.raw);

    if options.offline {
        if !entry.is_dir() {
            return Err(StencilError::SourceNotFound { path: entry });
        }
        info!(entry = %entry.display(), "using cached template");
        return Ok(FetchedTemplate {
            dir: entry,
            origin: Origin::Cached,
        });
    }

    let staging = tempfile::tempdir().map_err(|e| StencilError::Io {
        context: "creating temporary directory for template download".into(),
        source: e,
    })?;

    let spinner = spinner(&format!("downloading template {remote}"));
    let fetched = fetch_remote(remote, options, staging.path());
    spinner.finish_and_clear();
    fetched?;

    let dir = cache::store(staging, &entry)?;
    info!(template = %remote, dir = %dir.display(), "template cached");
    Ok(FetchedTemplate {
        dir,
        origin: Origin::Fetched,
    })
}

fn fetch_remote(remote: &RemoteTemplate, options: FetchOptions, dest: &std::path::Path) -> Result<()> {
    match remote.archive_url() {
        Some(url) if !options.clone && !remote.requires_clone() => {
            download::download_archive(&url, dest)
        }
        _ => {
            // git refuses to clone into an existing non-empty directory, so use a child.
            let checkout = dest.join("checkout");
            clone::clone_repo(&remote.clone_url(), remote.git_ref.as_deref(), &checkout)?;
            move_children(&checkout, dest)
        }
    }
}

fn move_children(from: &std::path::Path, to: &std::path::Path) -> Result<()> {
    let io_err = |e: std::io::Error| StencilError::Io {
        context: format!("moving cloned template out of {}", from.display()),
        source: e,
    };
    for entry in std::fs::read_dir(from).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        std::fs::rename(entry.path(), to.join(entry.file_name())).map_err(io_err)?;
    }
    std::fs::remove_dir(from).map_err(io_err)
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
