use heck::{
    ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToTitleCase, ToUpperCamelCase,
};
use serde::{Deserialize, Serialize};

/// A field computed from other context fields, declared under `[derived.<key>]`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum DerivedField {
    /// Case-transform another field: `{ from = "name", transform = "pascal" }`.
    Transform { from: String, transform: Transform },
    /// Render a Tera template: `{ template = "{{ name }}-{{ version }}" }`.
    Template { template: String },
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Upper,
    Lower,
    Kebab,
    Snake,
    Camel,
    Pascal,
    Title,
    ShoutySnake,
}

impl Transform {
    pub fn apply(self, input: &str) -> String {
        match self {
            Transform::Upper => input.to_uppercase(),
            Transform::Lower => input.to_lowercase(),
            Transform::Kebab => input.to_kebab_case(),
            Transform::Snake => input.to_snake_case(),
            Transform::Camel => input.to_lower_camel_case(),
            Transform::Pascal => input.to_upper_camel_case(),
            Transform::Title => input.to_title_case(),
            Transform::ShoutySnake => input.to_shouty_snake_case(),
        }
    }
}

/// Tera filter names exposed to templates, paired with their transform.
pub const HELPER_FILTERS: &[(&str, Transform)] = &[
    ("kebab_case", Transform::Kebab),
    ("snake_case", Transform::Snake),
    ("camel_case", Transform::Camel),
    ("pascal_case", Transform::Pascal),
    ("title_case", Transform::Title),
    ("shouty_snake_case", Transform::ShoutySnake),
];
