pub mod condition;
pub mod derived;
pub mod prompt;
pub mod schema;

use std::path::{Path, PathBuf};

use crate::error::{MetadataError, Result, StencilError};

pub use schema::TemplateConfig;

/// Name of the metadata descriptor at the root of a template.
pub const DESCRIPTOR_FILE: &str = "stencil.toml";

/// Subdirectory holding the template content, when present.
pub const CONTENT_DIR: &str = "template";

/// A template source directory with its descriptor (if any) loaded.
pub struct ResolvedTemplate {
    pub root: PathBuf,
    pub config: Option<TemplateConfig>,
    /// `<root>/template` when it exists, otherwise `root` itself.
    pub content_dir: PathBuf,
}

impl ResolvedTemplate {
    /// True when files live directly in the root next to the descriptor.
    pub fn content_is_root(&self) -> bool {
        self.content_dir == self.root
    }
}

/// Load the template at `template_dir`. A missing descriptor is not an error.
pub fn resolve_template(template_dir: &Path) -> Result<ResolvedTemplate> {
    if !template_dir.is_dir() {
        return Err(StencilError::SourceNotFound {
            path: template_dir.to_path_buf(),
        });
    }

    let config = load_descriptor(template_dir)?;
    let nested = template_dir.join(CONTENT_DIR);
    let content_dir = if nested.is_dir() {
        nested
    } else {
        template_dir.to_path_buf()
    };

    Ok(ResolvedTemplate {
        root: template_dir.to_path_buf(),
        config,
        content_dir,
    })
}

/// Load and validate `stencil.toml`, returning `None` if the template has none.
pub fn load_descriptor(template_dir: &Path) -> Result<Option<TemplateConfig>> {
    let path = template_dir.join(DESCRIPTOR_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path).map_err(|e| StencilError::Io {
        context: format!("reading {}", path.display()),
        source: e,
    })?;

    parse_descriptor(&content, &path).map(Some)
}

pub fn parse_descriptor(content: &str, path: &Path) -> Result<TemplateConfig> {
    let config: TemplateConfig =
        toml::from_str(content).map_err(|e| MetadataError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

    config.validate()?;

    Ok(config)
}
