use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, StencilError};
use crate::settings::Settings;

/// Where a template argument points.
#[derive(Debug, PartialEq)]
pub enum TemplateSource {
    Local(PathBuf),
    Remote(RemoteTemplate),
}

impl TemplateSource {
    pub fn is_remote(&self) -> bool {
        matches!(self, TemplateSource::Remote(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
    GitHub,
    GitLab,
    Bitbucket,
}

impl Host {
    const PREFIXES: &'static [(&'static str, Host)] = &[
        ("github:", Host::GitHub),
        ("gh:", Host::GitHub),
        ("gitlab:", Host::GitLab),
        ("gl:", Host::GitLab),
        ("bitbucket:", Host::Bitbucket),
        ("bb:", Host::Bitbucket),
    ];

    fn domain(self) -> &'static str {
        match self {
            Host::GitHub => "github.com",
            Host::GitLab => "gitlab.com",
            Host::Bitbucket => "bitbucket.org",
        }
    }

    fn default_ref(self) -> &'static str {
        match self {
            Host::GitHub => "HEAD",
            Host::GitLab | Host::Bitbucket => "master",
        }
    }
}

/// A template fetched over the network.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTemplate {
    /// The argument as typed, `#ref` included. Names the cache entry.
    pub raw: String,
    pub location: RemoteLocation,
    pub git_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteLocation {
    Hosted {
        host: Host,
        owner: String,
        repo: String,
    },
    /// A full git URL; only reachable by cloning.
    Url(String),
}

impl RemoteTemplate {
    /// The `.tar.gz` snapshot URL, or `None` for plain git URLs.
    pub fn archive_url(&self) -> Option<String> {
        let RemoteLocation::Hosted { host, owner, repo } = &self.location else {
            return None;
        };
        let git_ref = self.git_ref.as_deref().unwrap_or(host.default_ref());
        let domain = host.domain();
        Some(match host {
            Host::GitHub => format!("https://{domain}/{owner}/{repo}/archive/{git_ref}.tar.gz"),
            Host::GitLab => {
                format!("https://{domain}/{owner}/{repo}/-/archive/{git_ref}/{repo}-{git_ref}.tar.gz")
            }
            Host::Bitbucket => format!("https://{domain}/{owner}/{repo}/get/{git_ref}.tar.gz"),
        })
    }

    pub fn clone_url(&self) -> String {
        match &self.location {
            RemoteLocation::Hosted { host, owner, repo } => {
                format!("https://{}/{owner}/{repo}.git", host.domain())
            }
            RemoteLocation::Url(url) => url.clone(),
        }
    }

    /// Whether this template can only be fetched with git.
    pub fn requires_clone(&self) -> bool {
        matches!(self.location, RemoteLocation::Url(_))
    }

    /// The URL, when it would be fetched over unencrypted `http://`.
    pub fn insecure_url(&self) -> Option<&str> {
        match &self.location {
            RemoteLocation::Url(url) if url.starts_with("http://") => Some(url),
            _ => None,
        }
    }
}

impl fmt::Display for RemoteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            RemoteLocation::Hosted { owner, repo, .. } => write!(f, "{owner}/{repo}")?,
            RemoteLocation::Url(url) => write!(f, "{url}")?,
        }
        if let Some(git_ref) = &self.git_ref {
            write!(f, "#{git_ref}")?;
        }
        Ok(())
    }
}

/// True for `.`/`/`/`~`-prefixed paths and Windows drive paths like `C:\x`.
pub fn is_local_path(input: &str) -> bool {
    if input.starts_with(['.', '/', '~']) {
        return true;
    }
    let mut chars = input.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}

fn is_git_url(input: &str) -> bool {
    input.starts_with("https://")
        || input.starts_with("http://")
        || input.starts_with("git@")
        || input.starts_with("file://")
        || input.ends_with(".git")
}

/// Classify a template argument. Local paths must exist.
pub fn resolve_source(input: &str, settings: &Settings, cwd: &Path) -> Result<TemplateSource> {
    if input.trim().is_empty() {
        return Err(StencilError::InvalidReference {
            input: input.to_string(),
            reason: "template name is empty".into(),
        });
    }

    if is_local_path(input) {
        let expanded = settings.expand_home(Path::new(input));
        let path = if expanded.is_absolute() {
            expanded
        } else {
            cwd.join(expanded)
        };
        if !path.exists() {
            return Err(StencilError::SourceNotFound { path });
        }
        return path
            .canonicalize()
            .map(TemplateSource::Local)
            .map_err(|e| StencilError::Io {
                context: format!("resolving path {}", path.display()),
                source: e,
            });
    }

    parse_remote(input, &settings.official_org).map(TemplateSource::Remote)
}

/// Parse a remote reference such as `webpack`, `owner/repo#dev`, or `gl:owner/repo`.
pub fn parse_remote(input: &str, official_org: &str) -> Result<RemoteTemplate> {
    let invalid = |reason: &str| StencilError::InvalidReference {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    if is_git_url(input) {
        let (url, git_ref) = split_url_ref(input);
        return Ok(RemoteTemplate {
            raw: input.to_string(),
            location: RemoteLocation::Url(url.to_string()),
            git_ref: git_ref.map(String::from),
        });
    }

    let (body, git_ref) = match input.split_once('#') {
        Some((_, "")) => return Err(invalid("empty ref after '#'")),
        Some((body, git_ref)) => (body, Some(git_ref.to_string())),
        None => (input, None),
    };

    let (host, path) = Host::PREFIXES
        .iter()
        .find_map(|&(prefix, host)| body.strip_prefix(prefix).map(|rest| (host, rest)))
        .unwrap_or((Host::GitHub, body));

    let (owner, repo) = match path.split_once('/') {
        None if path.len() == body.len() => (official_org, path),
        None => return Err(invalid("expected owner/repo after the host prefix")),
        Some((owner, repo)) => (owner, repo),
    };

    if owner.is_empty() || repo.is_empty() {
        return Err(invalid("owner and repository must not be empty"));
    }
    if repo.contains('/') {
        return Err(invalid("expected exactly one '/' between owner and repository"));
    }

    Ok(RemoteTemplate {
        raw: input.to_string(),
        location: RemoteLocation::Hosted {
            host,
            owner: owner.to_string(),
            repo: repo.to_string(),
        },
        git_ref,
    })
}

/// Split a trailing `#ref` off a git URL, as in `https://host/repo.git#v2`.
fn split_url_ref(input: &str) -> (&str, Option<&str>) {
    match input.rsplit_once('#') {
        Some((url, git_ref)) if !git_ref.is_empty() && !git_ref.contains('/') => {
            (url, Some(git_ref))
        }
        _ => (input, None),
    }
}
