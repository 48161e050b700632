use std::collections::{BTreeMap, HashMap};
use std::process::Command;

use inquire::validator::{ErrorMessage, Validation};
use inquire::InquireError;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::prompt::{PromptConfig, PromptKind};
use crate::config::schema::TemplateConfig;
use crate::error::{Result, StencilError};

/// Answers keyed by prompt name, in the shape they enter the render context.
pub type AnswerSet = BTreeMap<String, Value>;

/// Source of answers for a template's prompts.
pub trait Prompter {
    /// Answer one prompt. `default` is the declared or computed default, if any.
    fn ask(&mut self, key: &str, prompt: &PromptConfig, default: Option<&Value>) -> Result<Value>;

    /// Called once with the descriptor before the first question.
    fn begin(&mut self, _config: &TemplateConfig) {}
}

#[derive(Default)]
pub struct PromptOptions {
    pub data_overrides: HashMap<String, String>,
    pub use_defaults: bool,
}

impl PromptOptions {
    /// Override keys that name no prompt in `config`, sorted.
    pub fn undeclared_overrides(&self, config: &TemplateConfig) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .data_overrides
            .keys()
            .map(String::as_str)
            .filter(|key| !config.prompts.contains_key(*key))
            .collect();
        keys.sort_unstable();
        keys
    }
}

/// Ask every declared prompt in order.
///
/// A prompt whose `when` is false is not asked and its answer is `null`.
pub fn collect_answers(
    config: &TemplateConfig,
    seed: &BTreeMap<String, Value>,
    prompter: &mut dyn Prompter,
) -> Result<AnswerSet> {
    prompter.begin(config);

    let mut answers = AnswerSet::new();
    let mut visible = seed.clone();

    for (key, prompt) in &config.prompts {
        if let Some(when) = &prompt.when {
            if !when.evaluate(&visible) {
                debug!(prompt = %key, when = %when, "condition false, skipping prompt");
                answers.insert(key.clone(), Value::Null);
                visible.insert(key.clone(), Value::Null);
                continue;
            }
        }

        let default = prompt
            .declared_default()
            .or_else(|| implicit_default(key, prompt, seed));
        let answer = prompter.ask(key, prompt, default.as_ref())?;

        check_answer(key, prompt, &answer).map_err(|message| StencilError::InvalidAnswer {
            name: key.clone(),
            message,
        })?;

        answers.insert(key.clone(), answer.clone());
        visible.insert(key.clone(), answer);
    }

    Ok(answers)
}

/// Defaults supplied for well-known input prompts that declare none.
fn implicit_default(key: &str, prompt: &PromptConfig, seed: &BTreeMap<String, Value>) -> Option<Value> {
    if !prompt.is_input() {
        return None;
    }
    match key {
        "name" => seed.get("name").cloned(),
        "author" => git_user().map(Value::String),
        _ => None,
    }
}

/// `Name <email>` from the user's git config, or whichever half is set.
pub fn git_user() -> Option<String> {
    let read = |key: &str| -> Option<String> {
        let output = Command::new("git").args(["config", "--get", key]).output().ok()?;
        if !output.status.success() {
            return None;
        }
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!value.is_empty()).then_some(value)
    };

    match (read("user.name"), read("user.email")) {
        (Some(name), Some(email)) => Some(format!("{name} <{email}>")),
        (Some(name), None) => Some(name),
        (None, Some(email)) => Some(email),
        (None, None) => None,
    }
}

/// Check an answer against the prompt's constraints.
fn check_answer(key: &str, prompt: &PromptConfig, answer: &Value) -> std::result::Result<(), String> {
    match &prompt.kind {
        PromptKind::Confirm { .. } => match answer {
            Value::Bool(_) => Ok(()),
            other => Err(format!("expected yes or no, got {other}")),
        },
        PromptKind::Choice { choices, .. } => {
            let value = answer.as_str().unwrap_or_default();
            if choices.iter().any(|c| c.value() == value) {
                Ok(())
            } else {
                let allowed: Vec<&str> = choices.iter().map(|c| c.value()).collect();
                Err(format!("'{value}' is not one of: {}", allowed.join(", ")))
            }
        }
        PromptKind::Input { .. } => {
            let Some(text) = answer.as_str() else {
                return Err(format!("expected text, got {answer}"));
            };
            check_input(key, prompt, text)
        }
    }
}

fn check_input(key: &str, prompt: &PromptConfig, text: &str) -> std::result::Result<(), String> {
    let PromptKind::Input {
        validate,
        validation_message,
        required,
        ..
    } = &prompt.kind
    else {
        return Ok(());
    };

    if *required && text.trim().is_empty() {
        return Err("a value is required".to_string());
    }

    match validate {
        Some(pattern) => {
            let re = regex_lite::Regex::new(pattern).map_err(|e| e.to_string())?;
            if re.is_match(text) {
                Ok(())
            } else {
                Err(validation_message
                    .clone()
                    .unwrap_or_else(|| format!("must match pattern: {pattern}")))
            }
        }
        None if key == "name" => validate_package_name(text),
        None => Ok(()),
    }
}

/// Check that `name` is usable as a package name: lowercase, url-safe,
/// no leading `.` or `_`, at most 214 characters. `@scope/name` is allowed.
pub fn validate_package_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("name must not be empty".into());
    }
    if name.len() > 214 {
        return Err("name can no longer contain more than 214 characters".into());
    }
    if name.trim() != name {
        return Err("name cannot contain leading or trailing spaces".into());
    }
    if name.starts_with('.') || name.starts_with('_') {
        return Err("name cannot start with a period or an underscore".into());
    }
    if name.to_lowercase() != name {
        return Err("name can no longer contain capital letters".into());
    }

    let bare = match name.strip_prefix('@') {
        Some(scoped) => match scoped.split_once('/') {
            Some((scope, pkg)) if !scope.is_empty() && !pkg.is_empty() => {
                is_url_safe(scope) && is_url_safe(pkg)
            }
            _ => false,
        },
        None => is_url_safe(name),
    };
    if !bare {
        return Err("name can only contain URL-friendly characters".into());
    }
    Ok(())
}

fn is_url_safe(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
}

/// The value accepting the prompt unchanged would produce, if there is one.
fn enter_value(prompt: &PromptConfig, default: Option<&Value>) -> Option<Value> {
    if let Some(default) = default {
        return Some(default.clone());
    }
    match &prompt.kind {
        PromptKind::Confirm { .. } => Some(Value::Bool(false)),
        PromptKind::Choice { choices, .. } => {
            choices.first().map(|c| Value::String(c.value().to_string()))
        }
        PromptKind::Input { required: false, .. } => Some(Value::String(String::new())),
        PromptKind::Input { required: true, .. } => None,
    }
}

/// Turn a `-d key=value` string into an answer for `prompt`.
pub fn parse_override(key: &str, raw: &str, prompt: &PromptConfig) -> Result<Value> {
    match &prompt.kind {
        PromptKind::Confirm { .. } => match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "n" | "0" => Ok(Value::Bool(false)),
            _ => Err(StencilError::InvalidAnswer {
                name: key.to_string(),
                message: format!("expected true or false, got '{raw}'"),
            }),
        },
        PromptKind::Choice { choices, .. } => choices
            .iter()
            .find(|c| c.value() == raw || c.label() == raw)
            .map(|c| Value::String(c.value().to_string()))
            .ok_or_else(|| StencilError::InvalidAnswer {
                name: key.to_string(),
                message: format!("'{raw}' is not one of the choices"),
            }),
        PromptKind::Input { .. } => Ok(Value::String(raw.to_string())),
    }
}

/// Asks on the terminal with inquire, unless an override or `--defaults` answers first.
pub struct InteractivePrompter {
    options: PromptOptions,
}

impl InteractivePrompter {
    pub fn new(options: PromptOptions) -> Self {
        Self { options }
    }
}

impl Prompter for InteractivePrompter {
    fn begin(&mut self, config: &TemplateConfig) {
        for key in self.options.undeclared_overrides(config) {
            warn!(%key, "ignoring -d override: the template has no prompt with this name");
        }
    }

    fn ask(&mut self, key: &str, prompt: &PromptConfig, default: Option<&Value>) -> Result<Value> {
        if let Some(raw) = self.options.data_overrides.get(key) {
            return parse_override(key, raw, prompt);
        }

        if self.options.use_defaults {
            if let Some(value) = enter_value(prompt, default) {
                return Ok(value);
            }
        }

        let message = prompt.message_or(key);
        match &prompt.kind {
            PromptKind::Confirm { .. } => {
                let default = default.and_then(Value::as_bool).unwrap_or(false);
                inquire::Confirm::new(message)
                    .with_default(default)
                    .prompt()
                    .map(Value::Bool)
                    .map_err(|e| prompt_error(key, e))
            }
            PromptKind::Input { .. } => {
                let default_text = default.and_then(Value::as_str).unwrap_or_default().to_string();
                let mut text = inquire::Text::new(message);
                if !default_text.is_empty() {
                    text = text.with_default(&default_text);
                }
                let key_owned = key.to_string();
                let prompt_owned = prompt.clone();
                text = text.with_validator(move |input: &str| {
                    Ok(match check_input(&key_owned, &prompt_owned, input) {
                        Ok(()) => Validation::Valid,
                        Err(msg) => Validation::Invalid(ErrorMessage::Custom(msg)),
                    })
                });
                text.prompt()
                    .map(Value::String)
                    .map_err(|e| prompt_error(key, e))
            }
            PromptKind::Choice { choices, .. } => {
                let labels: Vec<&str> = choices.iter().map(|c| c.label()).collect();
                let cursor = default
                    .and_then(Value::as_str)
                    .and_then(|d| choices.iter().position(|c| c.value() == d))
                    .unwrap_or(0);
                let picked = inquire::Select::new(message, labels)
                    .with_starting_cursor(cursor)
                    .raw_prompt()
                    .map_err(|e| prompt_error(key, e))?;
                Ok(Value::String(choices[picked.index].value().to_string()))
            }
        }
    }
}

fn prompt_error(key: &str, err: InquireError) -> StencilError {
    match err {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => {
            StencilError::UserCancelled
        }
        other => StencilError::Prompt {
            name: key.to_string(),
            source: other,
        },
    }
}

/// Answers from a fixed map, falling back to what accepting each prompt would give.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: HashMap<String, Value>,
    cancel: bool,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            cancel: false,
        }
    }

    /// A prompter that aborts at the first question, as Ctrl-C would.
    pub fn cancelling() -> Self {
        Self {
            answers: HashMap::new(),
            cancel: true,
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, key: &str, prompt: &PromptConfig, default: Option<&Value>) -> Result<Value> {
        if self.cancel {
            return Err(StencilError::UserCancelled);
        }
        if let Some(answer) = self.answers.get(key) {
            return Ok(answer.clone());
        }
        enter_value(prompt, default).ok_or_else(|| StencilError::MissingAnswer {
            name: key.to_string(),
        })
    }
}

/// Yes/no question on the terminal. Esc declines.
pub fn confirm(message: &str, default: bool) -> Result<bool> {
    match inquire::Confirm::new(message).with_default(default).prompt() {
        Ok(answer) => Ok(answer),
        Err(InquireError::OperationCanceled) => Ok(false),
        Err(InquireError::OperationInterrupted) => Err(StencilError::UserCancelled),
        Err(e) => Err(StencilError::Prompt {
            name: message.to_string(),
            source: e,
        }),
    }
}
