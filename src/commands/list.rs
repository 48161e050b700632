use std::time::SystemTime;

use console::style;
use miette::Result;

use stencil::logger;
use stencil::registry::list_official;
use stencil::settings::Settings;
use stencil::template::{list_cached, CachedTemplate};

pub fn run(cached: bool) -> Result<()> {
    let settings = Settings::load()?;
    if cached {
        run_cached(&settings)
    } else {
        run_official(&settings)
    }
}

fn run_official(settings: &Settings) -> Result<()> {
    let repos = list_official(settings)?;

    println!();
    println!("  Available official templates:");
    println!();
    for repo in &repos {
        println!(
            "  {} {} - {}",
            style("★").yellow(),
            style(&repo.name).blue(),
            repo.description.as_deref().unwrap_or("")
        );
    }
    println!();
    Ok(())
}

fn run_cached(settings: &Settings) -> Result<()> {
    let entries = list_cached(settings)?;

    if entries.is_empty() {
        println!(
            "No cached templates. Use '{}' with a remote template to cache one.",
            style("stencil init").cyan()
        );
        return Ok(());
    }

    println!(
        "{} ({} template{}) in {}\n",
        style("Cached templates").bold(),
        entries.len(),
        if entries.len() == 1 { "" } else { "s" },
        style(logger::tildify(&settings.cache_dir, &settings.home_dir)).cyan()
    );

    for entry in &entries {
        print_entry(entry);
    }

    Ok(())
}

fn print_entry(entry: &CachedTemplate) {
    let cached_at = entry
        .modified
        .map(format_age)
        .unwrap_or_else(|| "unknown".to_string());
    println!("  {} {}", style(&entry.key).blue(), style(format!("({cached_at})")).dim());
}

fn format_age(modified: SystemTime) -> String {
    let elapsed = SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default()
        .as_secs();

    if elapsed < 60 {
        "just now".to_string()
    } else if elapsed < 3600 {
        let mins = elapsed / 60;
        format!("{mins} minute{} ago", if mins == 1 { "" } else { "s" })
    } else if elapsed < 86400 {
        let hours = elapsed / 3600;
        format!("{hours} hour{} ago", if hours == 1 { "" } else { "s" })
    } else {
        let days = elapsed / 86400;
        format!("{days} day{} ago", if days == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(5, "just now")]
    #[case(60, "1 minute ago")]
    #[case(600, "10 minutes ago")]
    #[case(7200, "2 hours ago")]
    #[case(86400 * 3, "3 days ago")]
    fn formats_ages(#[case] secs_ago: u64, #[case] expected: &str) {
        let modified = SystemTime::now() - Duration::from_secs(secs_ago);
        assert_eq!(format_age(modified), expected);
    }
}
