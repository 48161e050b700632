use std::time::Duration;

use semver::Version;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, StencilError};
use crate::settings::Settings;
use crate::template::download::http_client;

/// The version of this build.
pub const INSTALLED_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Deserialize)]
struct RegistryRecord {
    #[serde(rename = "crate")]
    krate: CrateRecord,
}

#[derive(Debug, Deserialize)]
struct CrateRecord {
    max_stable_version: Option<String>,
    max_version: String,
}

impl CrateRecord {
    fn latest(&self) -> &str {
        self.max_stable_version.as_deref().unwrap_or(&self.max_version)
    }
}

/// A newer release than the running one exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateNotice {
    pub latest: Version,
    pub installed: Version,
}

/// Ask the registry for the latest release. Never fails: problems are logged
/// at debug level and treated as "no notice".
pub fn check_latest(settings: &Settings) -> Option<UpdateNotice> {
    if !settings.check_version {
        return None;
    }
    match fetch_latest(&settings.registry_url) {
        Ok(latest) => compare(INSTALLED_VERSION, &latest),
        Err(e) => {
            debug!(error = %e, "version check skipped");
            None
        }
    }
}

fn fetch_latest(url: &str) -> Result<String> {
    let failed = |reason: String| StencilError::Download {
        template: url.to_string(),
        reason,
    };
    let client = http_client(Duration::from_secs(1)).map_err(|e| failed(e.to_string()))?;
    let response = client.get(url).send().map_err(|e| failed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(failed(format!("registry responded with {}", response.status())));
    }
    let record: RegistryRecord = response.json().map_err(|e| failed(e.to_string()))?;
    Ok(record.krate.latest().to_string())
}

/// A notice when `latest` is a strictly newer semver than `installed`.
pub fn compare(installed: &str, latest: &str) -> Option<UpdateNotice> {
    let installed = Version::parse(installed.trim_start_matches('v')).ok()?;
    let latest = Version::parse(latest.trim_start_matches('v')).ok()?;
    (latest > installed).then_some(UpdateNotice { latest, installed })
}
