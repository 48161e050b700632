mod engine;

pub use engine::{
    collect_answers, confirm, git_user, parse_override, validate_package_name, AnswerSet,
    InteractivePrompter, PromptOptions, Prompter, ScriptedPrompter,
};
