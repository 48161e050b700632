use std::collections::BTreeMap;
use std::path::Path;

use indexmap::IndexMap;
use tera::{Context, Value};
use tracing::debug;

use crate::config::derived::DerivedField;
use crate::error::{MetadataError, RenderError};
use crate::render::file::{missing_variable, render_str};

pub fn build_context(variables: &BTreeMap<String, Value>) -> Context {
    let mut context = Context::new();
    for (key, value) in variables {
        context.insert(key, value);
    }
    context
}

/// The fields every render context starts with.
pub fn seed_context(name: &str, dest_dir: &Path, in_place: bool) -> BTreeMap<String, Value> {
    let dest_dir_name = dest_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());

    let mut seed = BTreeMap::new();
    seed.insert("name".to_string(), Value::String(name.to_string()));
    seed.insert("destDirName".to_string(), Value::String(dest_dir_name));
    seed.insert("inPlace".to_string(), Value::Bool(in_place));
    seed
}

enum Failure {
    Missing(String),
    Template(tera::Error),
}

/// Merge answers over the seed, then evaluate derived fields.
///
/// Derived fields are tried in declaration order and retried until a full pass
/// makes no progress, so a field may depend on one declared after it.
pub fn build_render_context(
    seed: &BTreeMap<String, Value>,
    answers: &BTreeMap<String, Value>,
    derived: &IndexMap<String, DerivedField>,
) -> Result<BTreeMap<String, Value>, MetadataError> {
    let mut values = seed.clone();
    values.extend(answers.iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut pending: Vec<(&String, &DerivedField)> = derived.iter().collect();
    while !pending.is_empty() {
        let mut stalled = Vec::new();
        let before = pending.len();

        for (name, field) in pending {
            match evaluate_derived(name, field, &values) {
                Ok(value) => {
                    debug!(field = %name, "derived field evaluated");
                    values.insert(name.clone(), value);
                }
                Err(failure) => stalled.push((name, failure)),
            }
        }

        if stalled.len() == before {
            return Err(explain_stall(stalled));
        }

        pending = stalled
            .into_iter()
            .map(|(name, _)| (name, &derived[name.as_str()]))
            .collect();
    }

    Ok(values)
}

fn evaluate_derived(
    name: &str,
    field: &DerivedField,
    values: &BTreeMap<String, Value>,
) -> Result<Value, Failure> {
    match field {
        DerivedField::Transform { from, transform } => {
            let input = match values.get(from) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) => String::new(),
                None => return Err(Failure::Missing(from.clone())),
                Some(other) => other.to_string(),
            };
            Ok(Value::String(transform.apply(&input)))
        }
        DerivedField::Template { template } => {
            let label = format!("derived field '{name}'");
            render_str(&label, template, &build_context(values))
                .map(Value::String)
                .map_err(|e| match e {
                    RenderError::UnresolvedToken { token, .. } => Failure::Missing(token),
                    RenderError::Template { source, .. } => match missing_variable(&source) {
                        Some(token) => Failure::Missing(token),
                        None => Failure::Template(source),
                    },
                    other => Failure::Template(tera::Error::msg(other.to_string())),
                })
        }
    }
}

/// Turn a set of derived fields that made no progress into the most useful error:
/// a cycle if one exists, otherwise the first unknown reference or template error.
fn explain_stall(stalled: Vec<(&String, Failure)>) -> MetadataError {
    let waiting_on: BTreeMap<&str, &str> = stalled
        .iter()
        .filter_map(|(name, failure)| match failure {
            Failure::Missing(token) => Some((name.as_str(), root_of(token))),
            Failure::Template(_) => None,
        })
        .collect();

    for (start, _) in &stalled {
        let mut chain = vec![start.to_string()];
        let mut current = start.as_str();
        while let Some(&next) = waiting_on.get(current) {
            if let Some(pos) = chain.iter().position(|n| n == next) {
                let mut cycle = chain[pos..].to_vec();
                cycle.push(next.to_string());
                return MetadataError::CyclicDerivation { chain: cycle };
            }
            chain.push(next.to_string());
            current = next;
        }
    }

    let mut stalled = stalled.into_iter();
    match stalled.next() {
        Some((name, Failure::Missing(token))) => MetadataError::UnknownField {
            location: format!("derived field '{name}'"),
            field: token,
        },
        Some((name, Failure::Template(source))) => MetadataError::Derivation {
            name: name.clone(),
            source,
        },
        None => MetadataError::CyclicDerivation { chain: Vec::new() },
    }
}

fn root_of(token: &str) -> &str {
    token.split('.').next().unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::derived::Transform;

    fn seed() -> BTreeMap<String, Value> {
        seed_context("my-app", Path::new("/tmp/my-app"), false)
    }

    fn template(s: &str) -> DerivedField {
        DerivedField::Template {
            template: s.to_string(),
        }
    }

    #[test]
    fn seed_has_name_and_destination() {
        let seed = seed_context("demo", Path::new("/work/demo-dir"), true);
        assert_eq!(seed["name"], Value::String("demo".into()));
        assert_eq!(seed["destDirName"], Value::String("demo-dir".into()));
        assert_eq!(seed["inPlace"], Value::Bool(true));
    }

    #[test]
    fn answers_override_seed() {
        let mut answers = BTreeMap::new();
        answers.insert("name".to_string(), Value::String("renamed".into()));
        let ctx = build_render_context(&seed(), &answers, &IndexMap::new()).unwrap();
        assert_eq!(ctx["name"], Value::String("renamed".into()));
    }

    #[test]
    fn derived_fields_may_depend_on_later_declarations() {
        let mut derived = IndexMap::new();
        derived.insert("banner".to_string(), template("{{ pascal }}!"));
        derived.insert(
            "pascal".to_string(),
            DerivedField::Transform {
                from: "name".into(),
                transform: Transform::Pascal,
            },
        );

        let ctx = build_render_context(&seed(), &BTreeMap::new(), &derived).unwrap();
        assert_eq!(ctx["pascal"], Value::String("MyApp".into()));
        assert_eq!(ctx["banner"], Value::String("MyApp!".into()));
    }

    #[test]
    fn two_field_cycle_is_reported() {
        let mut derived = IndexMap::new();
        derived.insert("a".to_string(), template("{{ b }}"));
        derived.insert("b".to_string(), template("{{ a }}"));

        match build_render_context(&seed(), &BTreeMap::new(), &derived) {
            Err(MetadataError::CyclicDerivation { chain }) => {
                assert_eq!(chain, vec!["a", "b", "a"]);
            }
            other => panic!("expected CyclicDerivation, got {other:?}"),
        }
    }

    #[test]
    fn transform_cycle_is_reported() {
        let mut derived = IndexMap::new();
        derived.insert(
            "upper".to_string(),
            DerivedField::Transform {
                from: "lower".into(),
                transform: Transform::Upper,
            },
        );
        derived.insert(
            "lower".to_string(),
            DerivedField::Transform {
                from: "upper".into(),
                transform: Transform::Lower,
            },
        );

        assert!(matches!(
            build_render_context(&seed(), &BTreeMap::new(), &derived),
            Err(MetadataError::CyclicDerivation { .. })
        ));
    }

    #[test]
    fn unknown_reference_is_reported() {
        let mut derived = IndexMap::new();
        derived.insert("greeting".to_string(), template("hi {{ nobody }}"));

        match build_render_context(&seed(), &BTreeMap::new(), &derived) {
            Err(MetadataError::UnknownField { field, location }) => {
                assert_eq!(field, "nobody");
                assert!(location.contains("greeting"));
            }
            other => panic!("expected UnknownField, got {other:?}"),
        }
    }

    #[test]
    fn broken_template_is_derivation_error() {
        let mut derived = IndexMap::new();
        derived.insert("bad".to_string(), template("{% if %}"));

        assert!(matches!(
            build_render_context(&seed(), &BTreeMap::new(), &derived),
            Err(MetadataError::Derivation { .. })
        ));
    }
}
