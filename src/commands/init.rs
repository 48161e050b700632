use std::path::{Path, PathBuf};

use console::style;
use miette::{IntoDiagnostic, Result};

use stencil::error::StencilError;
use stencil::logger;
use stencil::prompt::{confirm, InteractivePrompter, PromptOptions};
use stencil::settings::Settings;
use stencil::template::{fetch, resolve_source, FetchOptions, TemplateSource};
use stencil::version::check_latest;
use stencil::{FullGenerationPlan, GenerateOptions, Outcome};

pub struct InitArgs {
    pub template: String,
    pub project_name: Option<String>,
    pub clone: bool,
    pub offline: bool,
    pub data: Vec<(String, String)>,
    pub defaults: bool,
    pub yes: bool,
    pub dry_run: bool,
    pub verbose: bool,
}

/// Where the project goes and what it is called.
struct Target {
    name: String,
    dir: PathBuf,
    in_place: bool,
}

fn target(project_name: Option<&str>, cwd: &Path) -> Result<Target> {
    match project_name {
        None | Some(".") => {
            let name = cwd
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or(StencilError::EmptyProjectName)?;
            Ok(Target {
                name,
                dir: cwd.to_path_buf(),
                in_place: true,
            })
        }
        Some(raw) if raw.trim().is_empty() => Err(StencilError::EmptyProjectName.into()),
        Some(raw) => Ok(Target {
            name: raw.to_string(),
            dir: cwd.join(raw),
            in_place: false,
        }),
    }
}

pub fn run(args: InitArgs) -> Result<()> {
    let settings = Settings::load()?;
    let cwd = std::env::current_dir().into_diagnostic()?;
    let target = target(args.project_name.as_deref(), &cwd)?;

    let source = resolve_source(&args.template, &settings, &cwd)?;

    if args.offline {
        if let TemplateSource::Remote(remote) = &source {
            let cached = stencil::template::cache::entry_path(&settings, &remote.raw);
            println!(
                "> Use cached template at {}",
                style(logger::tildify(&cached, &settings.home_dir)).yellow()
            );
        }
    }

    if !args.yes && !args.dry_run && (target.in_place || target.dir.exists()) {
        let question = if target.in_place {
            "Generate project in current directory?"
        } else {
            "Target directory exists. Continue?"
        };
        if !confirm(question, false)? {
            return Ok(());
        }
    }

    if let TemplateSource::Remote(remote) = &source {
        if let Some(url) = remote.insecure_url().filter(|_| !args.offline) {
            logger::warn(format!("{url} is fetched over plain http; prefer https://"));
        }
    }

    if source.is_remote() && !args.offline {
        if let Some(notice) = check_latest(&settings) {
            println!("  {}", style("A newer version of stencil is available.").yellow());
            println!();
            println!("  latest:    {}", style(&notice.latest).green());
            println!("  installed: {}", style(&notice.installed).red());
            println!();
        }
    }

    let fetched = fetch(
        &source,
        FetchOptions {
            clone: args.clone,
            offline: args.offline,
        },
        &settings,
    )?;

    let options = GenerateOptions {
        name: target.name.clone(),
        source_dir: fetched.dir,
        dest_dir: target.dir,
        in_place: target.in_place,
    };
    let mut prompter = InteractivePrompter::new(PromptOptions {
        data_overrides: args.data.into_iter().collect(),
        use_defaults: args.defaults,
    });

    let plan = match stencil::plan_generation(&options, &mut prompter)? {
        Outcome::Completed(plan) => plan,
        Outcome::Cancelled => {
            logger::log("Cancelled, nothing was written.");
            return Ok(());
        }
    };

    if args.dry_run {
        print_dry_run(&plan, args.verbose);
        return Ok(());
    }

    let report = stencil::execute_generation(plan)?;
    println!();
    logger::success(format!("Generated \"{}\".", target.name));
    if let Some(message) = report.complete_message {
        println!("\n{message}");
    }
    Ok(())
}

fn print_dry_run(plan: &FullGenerationPlan, verbose: bool) {
    let files = &plan.render_plan.files;
    let rendered_count = files.iter().filter(|f| !f.is_copy).count();
    let copied_count = files.len() - rendered_count;

    println!(
        "\n{} Dry run: files that would be generated in {}",
        style("==>").cyan().bold(),
        style(plan.output_dir.display()).cyan()
    );

    for file in files {
        let action = if file.is_copy { "copy  " } else { "render" };
        println!("  {} {}", style(action).green(), file.relative_path.display());

        if verbose && !file.is_copy {
            println!("  {}", style("──────").dim());
            for line in String::from_utf8_lossy(&file.content).lines() {
                println!("  {line}");
            }
            println!("  {}", style("──────").dim());
        }
    }
    for skipped in &plan.render_plan.skipped {
        println!("  {} {}", style("skip  ").yellow(), skipped.display());
    }

    println!(
        "\nSummary: {rendered_count} rendered, {copied_count} copied, {} skipped",
        plan.render_plan.skipped.len()
    );
    println!("{} Dry run, no files written.", style("ℹ").blue().bold());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_project_name_generates_in_place() {
        let t = target(None, Path::new("/work/my-app")).unwrap();
        assert!(t.in_place);
        assert_eq!(t.name, "my-app");
        assert_eq!(t.dir, PathBuf::from("/work/my-app"));

        let dot = target(Some("."), Path::new("/work/my-app")).unwrap();
        assert!(dot.in_place);
    }

    #[test]
    fn named_project_goes_into_subdirectory() {
        let t = target(Some("blog"), Path::new("/work")).unwrap();
        assert!(!t.in_place);
        assert_eq!(t.name, "blog");
        assert_eq!(t.dir, PathBuf::from("/work/blog"));
    }

    #[test]
    fn blank_project_name_is_rejected() {
        assert!(target(Some("  "), Path::new("/work")).is_err());
    }
}
