pub mod config;
pub mod error;
pub mod logger;
pub mod prompt;
pub mod registry;
pub mod render;
pub mod settings;
pub mod template;
pub mod version;

use std::collections::BTreeMap;
use std::path::PathBuf;

use tera::Value;
use tracing::{debug, info};

use crate::config::resolve_template;
use crate::error::{Result, StencilError};
use crate::prompt::{collect_answers, AnswerSet, Prompter};
use crate::render::file::render_str;
use crate::render::{
    build_context, build_render_context, execute_plan, plan_render, seed_context,
    GeneratedProject, GenerationPlan,
};

pub struct GenerateOptions {
    /// Project name; seeds the `name` field.
    pub name: String,
    /// Template directory on the local filesystem.
    pub source_dir: PathBuf,
    /// Output directory, created if missing.
    pub dest_dir: PathBuf,
    /// Generating into the current directory.
    pub in_place: bool,
}

/// Result of an operation the user may abort at a prompt.
#[derive(Debug)]
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
}

/// Everything needed to execute a generation that has been planned but not yet written.
#[derive(Debug)]
pub struct FullGenerationPlan {
    pub render_plan: GenerationPlan,
    pub output_dir: PathBuf,
    pub answers: AnswerSet,
    pub context: BTreeMap<String, Value>,
    /// The template's completion message, already rendered.
    pub complete_message: Option<String>,
}

#[derive(Debug)]
pub struct GenerationReport {
    pub project: GeneratedProject,
    pub complete_message: Option<String>,
}

/// Plan a project generation: load metadata, collect answers, render in memory.
///
/// Nothing is written. Metadata and render errors surface here, so a failing
/// template never leaves a partial destination behind.
pub fn plan_generation(
    options: &GenerateOptions,
    prompter: &mut dyn Prompter,
) -> Result<Outcome<FullGenerationPlan>> {
    if options.name.trim().is_empty() {
        return Err(StencilError::EmptyProjectName);
    }

    let resolved = resolve_template(&options.source_dir)?;
    let seed = seed_context(&options.name, &options.dest_dir, options.in_place);

    let answers = match &resolved.config {
        Some(config) => match collect_answers(config, &seed, prompter) {
            Ok(answers) => answers,
            Err(StencilError::UserCancelled) => {
                info!("generation cancelled at a prompt");
                return Ok(Outcome::Cancelled);
            }
            Err(e) => return Err(e),
        },
        None => {
            debug!(source = %options.source_dir.display(), "no descriptor, copying verbatim");
            AnswerSet::new()
        }
    };

    let context = match &resolved.config {
        Some(config) => build_render_context(&seed, &answers, &config.derived)?,
        None => build_render_context(&seed, &answers, &Default::default())?,
    };

    let render_plan = plan_render(&resolved, &context)?;

    let complete_message = resolved
        .config
        .as_ref()
        .and_then(|c| c.template.complete_message.as_deref())
        .map(|message| render_str("complete_message", message, &build_context(&context)))
        .transpose()?;

    Ok(Outcome::Completed(FullGenerationPlan {
        render_plan,
        output_dir: options.dest_dir.clone(),
        answers,
        context,
        complete_message,
    }))
}

/// Execute a previously planned generation: create the destination and write files.
pub fn execute_generation(plan: FullGenerationPlan) -> Result<GenerationReport> {
    std::fs::create_dir_all(&plan.output_dir).map_err(|e| StencilError::Io {
        context: format!("creating output directory {}", plan.output_dir.display()),
        source: e,
    })?;

    let project = execute_plan(&plan.render_plan, &plan.output_dir)?;
    info!(
        rendered = project.files_rendered.len(),
        copied = project.files_copied.len(),
        skipped = project.files_skipped.len(),
        "project generated"
    );

    Ok(GenerationReport {
        project,
        complete_message: plan.complete_message,
    })
}

/// Generate a project from a local template directory.
pub fn generate(
    options: &GenerateOptions,
    prompter: &mut dyn Prompter,
) -> Result<Outcome<GenerationReport>> {
    match plan_generation(options, prompter)? {
        Outcome::Completed(plan) => execute_generation(plan).map(Outcome::Completed),
        Outcome::Cancelled => Ok(Outcome::Cancelled),
    }
}
