use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "stencil",
    about = "Scaffold new projects from local or remote templates",
    version,
    propagate_version = true,
    after_help = "Examples:\n  \
        # create a new project with an official template\n  \
        $ stencil init webpack my-project\n\n  \
        # create a new project straight from a GitHub template\n  \
        $ stencil init username/repo my-project"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a new project from a template
    Init {
        /// Official template name, owner/repo[#ref], gh:/gl:/bb: reference, git URL, or local path
        template: String,

        /// Project directory to create; omit or use "." to generate in place
        project_name: Option<String>,

        /// Use git clone instead of downloading an archive
        #[arg(short, long)]
        clone: bool,

        /// Use the cached copy of a remote template
        #[arg(long)]
        offline: bool,

        /// Answer a prompt without asking (can be repeated: -d key=value)
        #[arg(short, long = "data", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        data: Vec<(String, String)>,

        /// Accept declared defaults without prompting
        #[arg(long)]
        defaults: bool,

        /// Skip the confirmation for existing or in-place targets
        #[arg(short, long)]
        yes: bool,

        /// Show the files that would be generated without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// List official templates
    List {
        /// List locally cached templates instead
        #[arg(long)]
        cached: bool,
    },

    /// Prototype a project from a single file (reserved)
    Build,

    /// Create a project interactively (reserved)
    Create,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
