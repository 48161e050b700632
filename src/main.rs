mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init {
            template,
            project_name,
            clone,
            offline,
            data,
            defaults,
            yes,
            dry_run,
        } => commands::init::run(commands::init::InitArgs {
            template,
            project_name,
            clone,
            offline,
            data,
            defaults,
            yes,
            dry_run,
            verbose: cli.verbose > 0,
        }),
        Commands::List { cached } => commands::list::run(cached),
        Commands::Build => commands::reserved::run("build"),
        Commands::Create => commands::reserved::run("create"),
    }
}
