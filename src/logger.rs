//! User-facing terminal output. Diagnostics go through `tracing` instead.

use std::fmt::Display;
use std::path::Path;

use console::style;

pub fn log(message: impl Display) {
    println!("  {} {message}", style("stencil").dim());
}

pub fn success(message: impl Display) {
    println!("  {} {message}", style("✓").green().bold());
}

pub fn warn(message: impl Display) {
    eprintln!("{} {}", style("warning:").yellow().bold(), style(message).yellow());
}

/// Show `path` with the home directory replaced by `~`.
pub fn tildify(path: &Path, home: &Path) -> String {
    match path.strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~{}{}", std::path::MAIN_SEPARATOR, rest.display()),
        Err(_) => path.display().to_string(),
    }
}
