use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::condition::Condition;
use super::derived::DerivedField;
use super::prompt::{PromptConfig, PromptKind};
use crate::error::MetadataError;

/// Fields present in every render context before any prompt is asked.
pub const SEED_FIELDS: &[&str] = &["name", "destDirName", "inPlace"];

/// Root config structure deserialized from stencil.toml.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplateConfig {
    pub template: TemplateMetadata,

    /// Prompts in declaration order.
    #[serde(default)]
    pub prompts: IndexMap<String, PromptConfig>,

    /// Derived fields in declaration order.
    #[serde(default)]
    pub derived: IndexMap<String, DerivedField>,

    #[serde(default)]
    pub files: FilesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplateMetadata {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,

    /// Suffix for template files (default: ".tera").
    #[serde(default = "default_templates_suffix")]
    pub templates_suffix: String,

    /// Rendered with the context and shown after a successful generation.
    pub complete_message: Option<String>,
}

fn default_templates_suffix() -> String {
    ".tera".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct FilesConfig {
    /// Glob patterns for files to exclude from output.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Glob patterns for files rendered even without the template suffix.
    #[serde(default)]
    pub render: Vec<String>,

    /// Glob patterns for files to copy without rendering.
    #[serde(default)]
    pub copy_without_render: Vec<String>,

    #[serde(default)]
    pub conditional: Vec<ConditionalFile>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConditionalFile {
    /// Glob pattern matched against the file's path in the template.
    pub pattern: String,

    /// Matched files are excluded when this is false.
    pub when: Condition,
}

impl TemplateConfig {
    /// Validate the config for internal consistency.
    pub fn validate(&self) -> Result<(), MetadataError> {
        let mut visible: HashSet<&str> = SEED_FIELDS.iter().copied().collect();

        for (name, prompt) in &self.prompts {
            if let Some(when) = &prompt.when {
                check_fields(when, &visible, || format!("'when' of prompt '{name}'"))?;
            }

            match &prompt.kind {
                PromptKind::Choice { choices, default } => {
                    if choices.is_empty() {
                        return Err(MetadataError::InvalidPrompt {
                            name: name.clone(),
                            reason: "choice prompts must declare at least one choice".into(),
                        });
                    }
                    if let Some(default) = default {
                        if !choices.iter().any(|c| c.value() == default) {
                            return Err(MetadataError::InvalidPrompt {
                                name: name.clone(),
                                reason: format!("default '{default}' is not one of the choices"),
                            });
                        }
                    }
                }
                PromptKind::Input {
                    validate: Some(pattern),
                    ..
                } => {
                    regex_lite::Regex::new(pattern).map_err(|e| MetadataError::InvalidPrompt {
                        name: name.clone(),
                        reason: format!("invalid 'validate' pattern: {e}"),
                    })?;
                }
                _ => {}
            }

            visible.insert(name.as_str());
        }

        for name in self.derived.keys() {
            if !visible.insert(name.as_str()) {
                return Err(MetadataError::DuplicateField { name: name.clone() });
            }
        }

        for (name, field) in &self.derived {
            if let DerivedField::Transform { from, .. } = field {
                if !visible.contains(from.as_str()) {
                    return Err(MetadataError::UnknownField {
                        location: format!("derived field '{name}'"),
                        field: from.clone(),
                    });
                }
            }
        }

        for cond in &self.files.conditional {
            check_fields(&cond.when, &visible, || {
                format!("condition for '{}'", cond.pattern)
            })?;
        }

        Ok(())
    }
}

fn check_fields(
    condition: &Condition,
    visible: &HashSet<&str>,
    location: impl Fn() -> String,
) -> Result<(), MetadataError> {
    match condition.fields().into_iter().find(|f| !visible.contains(f)) {
        Some(field) => Err(MetadataError::UnknownField {
            location: location(),
            field: field.to_string(),
        }),
        None => Ok(()),
    }
}
