use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, StencilError};
use crate::settings::Settings;
use crate::template::download::http_client;

const GITHUB_API: &str = "https://api.github.com";

/// One repository of the official template organization.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OfficialTemplate {
    pub name: String,
    pub description: Option<String>,
}

/// Fetch the repositories of the official template organization.
pub fn list_official(settings: &Settings) -> Result<Vec<OfficialTemplate>> {
    let url = repos_url(&settings.official_org);
    let failed = |reason: String| StencilError::Download {
        template: url.clone(),
        reason,
    };

    let client = http_client(Duration::from_secs(10)).map_err(|e| failed(e.to_string()))?;
    debug!(%url, "listing official templates");
    let response = client
        .get(&url)
        .header("Accept", "application/vnd.github.v3+json")
        .send()
        .map_err(|e| failed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(failed(format!("GitHub responded with {}", response.status())));
    }

    let body = response.text().map_err(|e| failed(e.to_string()))?;
    parse_repos(&body).map_err(|e| failed(e.to_string()))
}

fn repos_url(org: &str) -> String {
    format!("{GITHUB_API}/users/{org}/repos")
}

fn parse_repos(body: &str) -> serde_json::Result<Vec<OfficialTemplate>> {
    let mut repos: Vec<OfficialTemplate> = serde_json::from_str(body)?;
    repos.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(repos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repos_url_uses_org() {
        assert_eq!(
            repos_url("stencil-templates"),
            "https://api.github.com/users/stencil-templates/repos"
        );
    }

    #[test]
    fn parses_and_sorts_repositories() {
        let body = r#"[
            {"name": "webpack", "description": "Full-featured setup", "stargazers_count": 9},
            {"name": "simple", "description": null}
        ]"#;
        let repos = parse_repos(body).unwrap();
        assert_eq!(
            repos,
            vec![
                OfficialTemplate {
                    name: "simple".into(),
                    description: None,
                },
                OfficialTemplate {
                    name: "webpack".into(),
                    description: Some("Full-featured setup".into()),
                },
            ]
        );
    }

    #[test]
    fn unexpected_payload_is_an_error() {
        assert!(parse_repos(r#"{"message": "Not Found"}"#).is_err());
    }
}
