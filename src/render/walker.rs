use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tera::{Context, Value};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::config::schema::TemplateConfig;
use crate::config::{ResolvedTemplate, DESCRIPTOR_FILE};
use crate::error::{MetadataError, RenderError, Result, StencilError};
use crate::render::build_context;
use crate::render::file::{is_binary_file, render_path_component, render_str};

#[derive(Debug)]
pub struct GeneratedProject {
    pub output_dir: PathBuf,
    pub files_rendered: Vec<PathBuf>,
    pub files_copied: Vec<PathBuf>,
    /// Template paths left out by a false condition.
    pub files_skipped: Vec<PathBuf>,
}

/// A file that would be created during generation.
#[derive(Debug)]
pub struct PlannedFile {
    /// Path relative to the output directory.
    pub relative_path: PathBuf,
    /// The file content (rendered template or copied bytes).
    pub content: Vec<u8>,
    /// Whether this file was copied verbatim (true) or rendered from a template (false).
    pub is_copy: bool,
}

/// The result of planning a generation without writing to disk.
#[derive(Debug)]
pub struct GenerationPlan {
    pub files: Vec<PlannedFile>,
    pub skipped: Vec<PathBuf>,
}

/// Glob sets and conditions compiled once per run.
struct FileRules<'a> {
    suffix: &'a str,
    exclude: GlobSet,
    render: GlobSet,
    copy: GlobSet,
    conditional_excludes: GlobSet,
}

impl<'a> FileRules<'a> {
    fn new(config: &'a TemplateConfig, variables: &BTreeMap<String, Value>) -> Result<Self> {
        let files = &config.files;

        let mut excluded_patterns = Vec::new();
        for cond in &files.conditional {
            if !cond.when.evaluate(variables) {
                debug!(pattern = %cond.pattern, when = %cond.when, "condition false, excluding");
                excluded_patterns.push(cond.pattern.clone());
            }
        }

        Ok(Self {
            suffix: &config.template.templates_suffix,
            exclude: build_glob_set(&files.exclude)?,
            render: build_glob_set(&files.render)?,
            copy: build_glob_set(&files.copy_without_render)?,
            conditional_excludes: build_glob_set(&excluded_patterns)?,
        })
    }

    fn strip_suffix<'s>(&self, path: &'s str) -> &'s str {
        if self.suffix.is_empty() {
            return path;
        }
        path.strip_suffix(self.suffix).unwrap_or(path)
    }

    fn is_excluded_by_condition(&self, rel: &str) -> bool {
        self.conditional_excludes.is_match(rel)
            || self.conditional_excludes.is_match(self.strip_suffix(rel))
    }

    fn wants_render(&self, rel: &str) -> bool {
        (!self.suffix.is_empty() && rel.ends_with(self.suffix))
            || self.render.is_match(rel)
            || self.render.is_match(self.strip_suffix(rel))
    }
}

/// Walk the template content and collect rendered/copied files into memory without writing.
///
/// Without a descriptor every file is copied byte-for-byte under its original path.
pub fn plan_render(
    resolved: &ResolvedTemplate,
    variables: &BTreeMap<String, Value>,
) -> Result<GenerationPlan> {
    let content_dir = &resolved.content_dir;
    if !content_dir.is_dir() {
        return Err(StencilError::SourceNotFound {
            path: content_dir.clone(),
        });
    }

    let rules = match &resolved.config {
        Some(config) => Some(FileRules::new(config, variables)?),
        None => None,
    };
    let context = build_context(variables);
    let skip_descriptor = resolved.content_is_root();

    let mut files = Vec::new();
    let mut skipped = Vec::new();

    let walker = WalkDir::new(content_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored(e, content_dir, skip_descriptor));

    for entry in walker {
        let entry = entry.map_err(|e| StencilError::Io {
            context: format!("walking {}", content_dir.display()),
            source: e.into(),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }

        let src_path = entry.path();
        let Ok(rel_path) = src_path.strip_prefix(content_dir) else {
            continue;
        };
        let rel_str = slash_path(rel_path);

        let Some(rules) = &rules else {
            files.push(PlannedFile {
                relative_path: rel_path.to_path_buf(),
                content: read_bytes(src_path)?,
                is_copy: true,
            });
            continue;
        };

        if rules.exclude.is_match(&rel_str) {
            continue;
        }

        if rules.is_excluded_by_condition(&rel_str) {
            skipped.push(rel_path.to_path_buf());
            continue;
        }

        let rendered_rel = render_relative_path(rel_path, &rel_str, &context, rules.suffix)?;
        let rendered_str = slash_path(&rendered_rel);

        let should_render = rules.wants_render(&rel_str)
            && !rules.copy.is_match(&rendered_str)
            && !is_binary_file(src_path);

        if should_render {
            let content = std::fs::read_to_string(src_path).map_err(|e| StencilError::Io {
                context: format!("reading {}", src_path.display()),
                source: e,
            })?;
            let rendered = render_str(&rel_str, &content, &context)?;
            debug!(file = %rel_str, "rendered");
            files.push(PlannedFile {
                relative_path: rendered_rel,
                content: rendered.into_bytes(),
                is_copy: false,
            });
        } else {
            debug!(file = %rel_str, "copied");
            files.push(PlannedFile {
                relative_path: rendered_rel,
                content: read_bytes(src_path)?,
                is_copy: true,
            });
        }
    }

    Ok(GenerationPlan { files, skipped })
}

/// Write the files from a generation plan to disk.
pub fn execute_plan(plan: &GenerationPlan, output_dir: &Path) -> Result<GeneratedProject> {
    let mut files_rendered = Vec::new();
    let mut files_copied = Vec::new();

    for file in &plan.files {
        let dest_path = output_dir.join(&file.relative_path);
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RenderError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(&dest_path, &file.content).map_err(|e| RenderError::Write {
            path: dest_path.clone(),
            source: e,
        })?;
        if file.is_copy {
            files_copied.push(file.relative_path.clone());
        } else {
            files_rendered.push(file.relative_path.clone());
        }
    }

    Ok(GeneratedProject {
        output_dir: output_dir.to_path_buf(),
        files_rendered,
        files_copied,
        files_skipped: plan.skipped.clone(),
    })
}

fn is_ignored(entry: &DirEntry, content_dir: &Path, skip_descriptor: bool) -> bool {
    if entry.file_type().is_dir() && entry.file_name() == ".git" {
        return true;
    }
    skip_descriptor && entry.depth() == 1 && entry.path() == content_dir.join(DESCRIPTOR_FILE)
}

/// Render each component of a relative path through Tera, and strip the template suffix
/// from the file name.
fn render_relative_path(
    rel_path: &Path,
    rel_str: &str,
    context: &Context,
    suffix: &str,
) -> Result<PathBuf> {
    let mut rendered = PathBuf::new();
    let mut components = rel_path.components().peekable();
    while let Some(component) = components.next() {
        let Component::Normal(part) = component else {
            continue;
        };
        let part = part.to_string_lossy();
        let mut rendered_part = render_path_component(&part, rel_str, context)?;

        if components.peek().is_none() && !suffix.is_empty() && rendered_part.ends_with(suffix) {
            rendered_part.truncate(rendered_part.len() - suffix.len());
        }

        if !is_plain_name(&rendered_part) {
            return Err(RenderError::UnsafePath {
                file: rel_str.to_string(),
                component: part.into_owned(),
                rendered: rendered_part,
            }
            .into());
        }
        rendered.push(rendered_part);
    }
    Ok(rendered)
}

/// A single file or directory name: no separators, no `.`/`..`, no root or drive prefix.
fn is_plain_name(name: &str) -> bool {
    if name.contains(|c| c == '/' || c == '\\') {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| StencilError::Io {
        context: format!("reading {}", path.display()),
        source: e,
    })
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| MetadataError::GlobPattern {
            pattern: pattern.clone(),
            source: e,
        })?;
        builder.add(glob);
    }
    Ok(builder.build().map_err(|e| MetadataError::GlobPattern {
        pattern: "<combined>".into(),
        source: e,
    })?)
}
