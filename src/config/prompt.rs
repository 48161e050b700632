use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::condition::Condition;

/// A question declared under `[prompts.<key>]`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PromptConfig {
    /// Text shown to the user; the key is used when absent.
    pub message: Option<String>,

    /// The prompt is skipped (and its field set to null) when this is false.
    pub when: Option<Condition>,

    #[serde(flatten)]
    pub kind: PromptKind,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PromptKind {
    Confirm {
        default: Option<bool>,
    },
    Input {
        default: Option<String>,
        /// Regex the answer must match.
        validate: Option<String>,
        validation_message: Option<String>,
        #[serde(default)]
        required: bool,
    },
    Choice {
        choices: Vec<Choice>,
        default: Option<String>,
    },
}

/// A choice is either a bare value or a `{ label, value }` pair.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Choice {
    Plain(String),
    Labeled { label: String, value: String },
}

impl Choice {
    pub fn value(&self) -> &str {
        match self {
            Choice::Plain(v) => v,
            Choice::Labeled { value, .. } => value,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Choice::Plain(v) => v,
            Choice::Labeled { label, .. } => label,
        }
    }
}

impl PromptConfig {
    pub fn message_or<'a>(&'a self, key: &'a str) -> &'a str {
        self.message.as_deref().unwrap_or(key)
    }

    /// The declared default as a context value.
    pub fn declared_default(&self) -> Option<Value> {
        match &self.kind {
            PromptKind::Confirm { default } => default.map(Value::Bool),
            PromptKind::Input { default, .. } | PromptKind::Choice { default, .. } => {
                default.clone().map(Value::String)
            }
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(self.kind, PromptKind::Input { .. })
    }
}
