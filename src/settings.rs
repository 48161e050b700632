use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, StencilError};

pub const DEFAULT_OFFICIAL_ORG: &str = "stencil-templates";
pub const DEFAULT_REGISTRY_URL: &str = "https://crates.io/api/v1/crates/stencil";

/// Runtime settings passed explicitly to the resolver and notifier.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Target of `~` in local template paths.
    pub home_dir: PathBuf,
    /// One subdirectory per fetched remote template.
    pub cache_dir: PathBuf,
    /// GitHub user or organization that hosts official templates.
    pub official_org: String,
    pub registry_url: String,
    pub check_version: bool,
}

/// The optional `~/.config/stencil/config.toml` file. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    cache_dir: Option<PathBuf>,
    official_org: Option<String>,
    registry_url: Option<String>,
    check_version: Option<bool>,
}

impl Settings {
    /// Defaults rooted at `home_dir`.
    pub fn with_home(home_dir: impl Into<PathBuf>) -> Self {
        let home_dir = home_dir.into();
        Self {
            cache_dir: home_dir.join(".stencil-templates"),
            home_dir,
            official_org: DEFAULT_OFFICIAL_ORG.to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            check_version: true,
        }
    }

    /// Load settings from the user config file and the environment.
    ///
    /// A missing file gives the defaults; a malformed one is an error.
    pub fn load() -> Result<Self> {
        let home_dir = dirs::home_dir().ok_or_else(|| StencilError::Io {
            context: "unable to determine the home directory".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no home directory"),
        })?;
        let mut settings = Self::with_home(home_dir);

        if let Some(path) = config_path() {
            settings.apply_file(&path)?;
        }
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(path).map_err(|e| StencilError::Io {
            context: format!("reading settings {}", path.display()),
            source: e,
        })?;
        let file: SettingsFile =
            toml::from_str(&content).map_err(|e| StencilError::SettingsParse {
                path: path.to_path_buf(),
                source: e,
            })?;

        if let Some(dir) = file.cache_dir {
            self.cache_dir = self.expand_home(&dir);
        }
        if let Some(org) = file.official_org {
            self.official_org = org;
        }
        if let Some(url) = file.registry_url {
            self.registry_url = url;
        }
        if let Some(check) = file.check_version {
            self.check_version = check;
        }
        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("STENCIL_CACHE_DIR").filter(|d| !d.is_empty()) {
            self.cache_dir = self.expand_home(Path::new(&dir));
        }
        if let Some(org) = var("STENCIL_OFFICIAL_ORG").filter(|o| !o.is_empty()) {
            self.official_org = org;
        }
        if var("STENCIL_NO_UPDATE_CHECK").is_some_and(|v| !v.is_empty() && v != "0") {
            self.check_version = false;
        }
    }

    /// Replace a leading `~` with the home directory.
    pub fn expand_home(&self, path: &Path) -> PathBuf {
        match path.strip_prefix("~") {
            Ok(rest) => self.home_dir.join(rest),
            Err(_) => path.to_path_buf(),
        }
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("stencil").join("config.toml"))
}
