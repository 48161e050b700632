use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::{Result, StencilError};

/// Turn git's stderr into a message with a next step for common failures.
fn classify_clone_error(stderr: &str) -> String {
    if stderr.contains("Authentication failed") || stderr.contains("could not read Username") {
        format!("authentication failed; configure git credentials or SSH keys\n\ngit output:\n{stderr}")
    } else if stderr.contains("Repository not found")
        || (stderr.contains("not found") && stderr.contains("repository"))
    {
        format!("repository not found; check the name, and your credentials if it is private\n\ngit output:\n{stderr}")
    } else if stderr.contains("Remote branch") && stderr.contains("not found") {
        format!("ref not found in the repository\n\ngit output:\n{stderr}")
    } else if stderr.contains("Could not resolve host") || stderr.contains("Connection refused") {
        format!("network error; check your connection\n\ngit output:\n{stderr}")
    } else {
        stderr.to_string()
    }
}

/// Shallow-clone `url` into `dest` with the system `git`, so the user's own
/// credential helpers and SSH agent apply. `file://` URLs are rejected.
pub fn clone_repo(url: &str, git_ref: Option<&str>, dest: &Path) -> Result<()> {
    if url.starts_with("file://") {
        return Err(StencilError::UnsafeUrl {
            url: url.to_string(),
            reason: "file:// URLs are not allowed for remote templates".into(),
        });
    }

    Command::new("git")
        .arg("--version")
        .output()
        .map_err(|_| StencilError::GitNotFound)?;

    let mut cmd = Command::new("git");
    cmd.env("GIT_TERMINAL_PROMPT", "0")
        .arg("clone")
        .arg("--depth")
        .arg("1")
        .arg("--quiet");
    if let Some(git_ref) = git_ref {
        cmd.arg("--branch").arg(git_ref);
    }
    cmd.arg(url).arg(dest);

    debug!(%url, ?git_ref, dest = %dest.display(), "git clone");
    let output = cmd.output().map_err(|e| StencilError::Io {
        context: "running git clone".into(),
        source: e,
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StencilError::Download {
            template: url.to_string(),
            reason: classify_clone_error(stderr.trim()),
        });
    }

    // The clone's history is not part of the template.
    let git_dir = dest.join(".git");
    if git_dir.exists() {
        std::fs::remove_dir_all(&git_dir).map_err(|e| StencilError::Io {
            context: format!("removing {}", git_dir.display()),
            source: e,
        })?;
    }

    Ok(())
}
