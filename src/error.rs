#![allow(unused_assignments)]

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum StencilError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Render(#[from] RenderError),

    #[error("Template not found: {path}")]
    #[diagnostic(help("Check the path, or fetch the template once without --offline"))]
    SourceNotFound { path: PathBuf },

    #[error("Failed to download {template}: {reason}")]
    #[diagnostic(help("Check the template name and your network connection"))]
    Download { template: String, reason: String },

    #[error("Invalid template reference '{input}': {reason}")]
    #[diagnostic(help(
        "Use a local path, an official name, owner/repo[#ref], or gh:/gl:/bb: prefixes"
    ))]
    InvalidReference { input: String, reason: String },

    #[error("Unsafe URL scheme in '{url}': {reason}")]
    #[diagnostic(help("Use https:// URLs for remote templates"))]
    UnsafeUrl { url: String, reason: String },

    #[error("git executable not found")]
    #[diagnostic(help("Install git, or drop --clone to download an archive instead"))]
    GitNotFound,

    #[error("Project name must not be empty")]
    EmptyProjectName,

    #[error("No answer provided for '{name}'")]
    #[diagnostic(help("Pass it with -d {name}=VALUE or declare a default"))]
    MissingAnswer { name: String },

    #[error("Invalid answer for '{name}': {message}")]
    InvalidAnswer { name: String, message: String },

    #[error("Prompt failed for '{name}'")]
    Prompt {
        name: String,
        #[source]
        source: inquire::InquireError,
    },

    #[error("Failed to parse settings file {path}")]
    #[diagnostic(help("Check the TOML syntax of your stencil config.toml"))]
    SettingsParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// A template's `stencil.toml` is malformed or internally inconsistent.
#[derive(Debug, Error, Diagnostic)]
pub enum MetadataError {
    #[error("Failed to parse {path}")]
    #[diagnostic(help("Check the TOML syntax in your stencil.toml file"))]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid prompt '{name}': {reason}")]
    InvalidPrompt { name: String, reason: String },

    #[error("Invalid condition '{expr}': {reason}")]
    #[diagnostic(help(
        "Conditions support ==, !=, &&, ||, !, parentheses, literals and field names"
    ))]
    InvalidCondition { expr: String, reason: String },

    #[error("{location} references undeclared field '{field}'")]
    #[diagnostic(help("Declare '{field}' under [prompts] or [derived] in stencil.toml"))]
    UnknownField { location: String, field: String },

    #[error("Field '{name}' is declared more than once")]
    DuplicateField { name: String },

    #[error("Derived field '{name}' failed to evaluate")]
    Derivation {
        name: String,
        #[source]
        source: tera::Error,
    },

    #[error("Cyclic derived fields: {}", chain.join(" -> "))]
    #[diagnostic(help("Break the cycle so every derived field bottoms out in a prompt"))]
    CyclicDerivation { chain: Vec<String> },

    #[error("Glob pattern error: {pattern}")]
    GlobPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// A file could not be rendered or written.
#[derive(Debug, Error, Diagnostic)]
pub enum RenderError {
    #[error("Unresolved token '{token}' in {file}")]
    #[diagnostic(help("Declare '{token}' as a prompt or derived field in stencil.toml"))]
    UnresolvedToken { file: String, token: String },

    #[error("Failed to render {file}")]
    #[diagnostic(help("Check your Tera template syntax"))]
    Template {
        file: String,
        #[source]
        source: tera::Error,
    },

    #[error("Path component '{component}' in {file} rendered to '{rendered}'")]
    #[diagnostic(help("Path variables must render to a single, non-empty file or directory name"))]
    UnsafePath {
        file: String,
        component: String,
        rendered: String,
    },

    #[error("Failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StencilError>;
