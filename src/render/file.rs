use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use tera::ast::{Expr, ExprVal, FunctionCall, Node};
use tera::{Context, Tera, Value};

use crate::config::derived::HELPER_FILTERS;
use crate::error::RenderError;

/// A Tera instance with the case-conversion helpers registered and autoescape off.
pub fn new_tera() -> Tera {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    for &(name, transform) in HELPER_FILTERS {
        tera.register_filter(
            name,
            move |value: &Value, _: &HashMap<String, Value>| match value.as_str() {
                Some(s) => Ok(Value::String(transform.apply(s))),
                None => Err(tera::Error::msg(format!(
                    "Filter `{name}` expects a string, got `{value}`"
                ))),
            },
        );
    }
    tera
}

/// Render `source` as a Tera template. `label` names it in errors.
///
/// Every variable the template mentions must be in `context`, including those only
/// read by `if` and `for` tags, unless a `default` filter or `is defined` test guards it.
pub fn render_str(label: &str, source: &str, context: &Context) -> Result<String, RenderError> {
    let mut tera = new_tera();
    tera.add_raw_template(label, source)
        .map_err(|e| render_error(label, e))?;

    let template = tera.get_template(label).map_err(|e| render_error(label, e))?;
    if let Some(token) = first_unresolved(&template.ast, context, &mut Vec::new()) {
        return Err(RenderError::UnresolvedToken {
            file: label.to_string(),
            token,
        });
    }

    tera.render(label, context).map_err(|e| render_error(label, e))
}

fn render_error(label: &str, err: tera::Error) -> RenderError {
    match missing_variable(&err) {
        Some(token) => RenderError::UnresolvedToken {
            file: label.to_string(),
            token,
        },
        None => RenderError::Template {
            file: label.to_string(),
            source: err,
        },
    }
}

/// The first variable in `nodes` that is neither in `context` nor bound by an
/// enclosing `for` or an earlier `set`.
fn first_unresolved(nodes: &[Node], context: &Context, bound: &mut Vec<String>) -> Option<String> {
    for node in nodes {
        let found = match node {
            Node::VariableBlock(_, expr) => unresolved_in_expr(expr, context, bound),
            Node::Set(_, set) => {
                let found = unresolved_in_expr(&set.value, context, bound);
                bound.push(set.key.clone());
                found
            }
            Node::If(branches, _) => branches
                .conditions
                .iter()
                .find_map(|(_, condition, body)| {
                    unresolved_in_expr(condition, context, bound)
                        .or_else(|| first_unresolved(body, context, bound))
                })
                .or_else(|| {
                    let (_, body) = branches.otherwise.as_ref()?;
                    first_unresolved(body, context, bound)
                }),
            Node::Forloop(_, forloop, _) => {
                unresolved_in_expr(&forloop.container, context, bound).or_else(|| {
                    let depth = bound.len();
                    bound.extend(forloop.key.iter().cloned());
                    bound.push(forloop.value.clone());
                    bound.push("loop".to_string());
                    let found = first_unresolved(&forloop.body, context, bound);
                    bound.truncate(depth);
                    found.or_else(|| {
                        let empty_body = forloop.empty_body.as_deref()?;
                        first_unresolved(empty_body, context, bound)
                    })
                })
            }
            Node::FilterSection(_, section, _) => unresolved_in_call(&section.filter, context, bound)
                .or_else(|| first_unresolved(&section.body, context, bound)),
            Node::Block(_, block, _) => first_unresolved(&block.body, context, bound),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

fn unresolved_in_expr(expr: &Expr, context: &Context, bound: &[String]) -> Option<String> {
    let found = match &expr.val {
        ExprVal::Ident(ident) if !expr.has_default_filter() => unresolved_ident(ident, context, bound),
        ExprVal::Math(math) => unresolved_in_expr(&math.lhs, context, bound)
            .or_else(|| unresolved_in_expr(&math.rhs, context, bound)),
        ExprVal::Logic(logic) => unresolved_in_expr(&logic.lhs, context, bound)
            .or_else(|| unresolved_in_expr(&logic.rhs, context, bound)),
        ExprVal::In(contains) => unresolved_in_expr(&contains.lhs, context, bound)
            .or_else(|| unresolved_in_expr(&contains.rhs, context, bound)),
        // `x is defined` and friends are how a template asks about a missing variable.
        ExprVal::Test(test) => test
            .args
            .iter()
            .find_map(|arg| unresolved_in_expr(arg, context, bound)),
        ExprVal::FunctionCall(call) => unresolved_in_call(call, context, bound),
        ExprVal::Array(items) => items
            .iter()
            .find_map(|item| unresolved_in_expr(item, context, bound)),
        ExprVal::StringConcat(concat) => concat.values.iter().find_map(|value| match value {
            ExprVal::Ident(ident) => unresolved_ident(ident, context, bound),
            _ => None,
        }),
        _ => None,
    };
    found.or_else(|| {
        expr.filters
            .iter()
            .find_map(|filter| unresolved_in_call(filter, context, bound))
    })
}

fn unresolved_in_call(call: &FunctionCall, context: &Context, bound: &[String]) -> Option<String> {
    let mut names: Vec<&String> = call.args.keys().collect();
    names.sort();
    names
        .into_iter()
        .find_map(|name| unresolved_in_expr(&call.args[name], context, bound))
}

fn unresolved_ident(ident: &str, context: &Context, bound: &[String]) -> Option<String> {
    let root = ident.split(|c| c == '.' || c == '[').next().unwrap_or(ident);
    if root == "__tera_context" || context.contains_key(root) || bound.iter().any(|b| b == root) {
        None
    } else {
        Some(root.to_string())
    }
}

/// Render template expressions in a path component (e.g. `{{ name }}`).
pub fn render_path_component(
    component: &str,
    file: &str,
    context: &Context,
) -> Result<String, RenderError> {
    if !component.contains("{{") && !component.contains("{%") {
        return Ok(component.to_string());
    }
    render_str(file, component, context).map_err(|e| match e {
        RenderError::UnresolvedToken { token, .. } => RenderError::UnresolvedToken {
            file: file.to_string(),
            token,
        },
        other => other,
    })
}

/// The variable name behind a Tera "not found in context" error, if that is what `err` is.
pub fn missing_variable(err: &tera::Error) -> Option<String> {
    static PATTERN: OnceLock<regex_lite::Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        regex_lite::Regex::new(r"Variable `([^`]+)` not found").expect("valid regex")
    });

    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(caps) = re.captures(&e.to_string()) {
            return Some(caps[1].to_string());
        }
        current = e.source();
    }
    None
}

/// Detect binary files using content_inspector (BOM-aware, null-byte scanning).
///
/// Reads only the first 8KB to avoid unnecessary allocation for large files.
pub fn is_binary_file(path: &Path) -> bool {
    use std::io::Read;

    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };

    let mut buf = Vec::with_capacity(8192);
    if file.take(8192).read_to_end(&mut buf).is_err() {
        return false;
    }

    !content_inspector::inspect(&buf).is_text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    #[rstest]
    #[case(b"Hello, world!", false)]
    #[case(&(0..256).map(|i| i as u8).collect::<Vec<u8>>(), true)]
    fn test_is_binary_file(#[case] content: &[u8], #[case] expected_binary: bool) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("test.bin");
        fs::write(&file, content).unwrap();

        assert_eq!(is_binary_file(&file), expected_binary);
    }

    #[test]
    fn test_is_binary_file_nonexistent_file() {
        assert!(!is_binary_file(Path::new("/nonexistent/file.txt")));
    }

    #[test]
    fn test_render_path_component() {
        let mut context = Context::new();
        context.insert("name", "my-project");

        let result = render_path_component("{{ name }}.js", "src/{{ name }}.js", &context).unwrap();
        assert_eq!(result, "my-project.js");
    }

    #[test]
    fn test_plain_path_component_is_untouched() {
        let context = Context::new();
        let result = render_path_component("{#weird}.txt", "{#weird}.txt", &context).unwrap();
        assert_eq!(result, "{#weird}.txt");
    }

    #[test]
    fn test_unresolved_path_token_names_file_and_token() {
        let context = Context::new();
        let err = render_path_component("{{ missing }}", "src/{{ missing }}/a.txt", &context)
            .unwrap_err();
        match err {
            RenderError::UnresolvedToken { file, token } => {
                assert_eq!(file, "src/{{ missing }}/a.txt");
                assert_eq!(token, "missing");
            }
            other => panic!("expected UnresolvedToken, got {other:?}"),
        }
    }

    #[test]
    fn test_helper_filters_are_registered() {
        let mut context = Context::new();
        context.insert("name", "my-app");
        let out = render_str(
            "helpers",
            "{{ name | pascal_case }} {{ name | snake_case }} {{ name | camel_case }}",
            &context,
        )
        .unwrap();
        assert_eq!(out, "MyApp my_app myApp");
    }

    #[test]
    fn test_html_like_names_are_not_escaped() {
        let mut context = Context::new();
        context.insert("title", "<Tom & Jerry>");
        let out = render_str("index.html", "{{ title }}", &context).unwrap();
        assert_eq!(out, "<Tom & Jerry>");
    }

    #[rstest]
    #[case("x{% if nobody_declared %}y{% endif %}z", "nobody_declared")]
    #[case("{% if known %}{% elif other.field %}b{% endif %}", "other")]
    #[case("{% for item in items %}{{ item }}{% endfor %}", "items")]
    #[case("{% for k, v in known_map %}{{ k }}{{ missing_inside }}{% endfor %}", "missing_inside")]
    #[case("{{ known | replace(from=\"a\", to=missing_arg) }}", "missing_arg")]
    fn test_unresolved_token_in_tags(#[case] source: &str, #[case] expected: &str) {
        let mut context = Context::new();
        context.insert("known", &false);
        context.insert("known_map", &serde_json::json!({"a": 1}));

        let err = render_str("a.txt", source, &context).unwrap_err();
        match err {
            RenderError::UnresolvedToken { file, token } => {
                assert_eq!(file, "a.txt");
                assert_eq!(token, expected);
            }
            other => panic!("expected UnresolvedToken, got {other:?}"),
        }
    }

    #[rstest]
    #[case("{% for item in list %}{{ item }}{{ loop.index }}{% endfor %}", "a1b2")]
    #[case("{% set greeting = \"hi\" %}{{ greeting }}", "hi")]
    #[case("{{ absent | default(value=\"d\") }}", "d")]
    #[case("{% if absent is defined %}yes{% else %}no{% endif %}", "no")]
    #[case("{% if skipped %}yes{% else %}no{% endif %}", "no")]
    fn test_bound_and_guarded_variables_render(#[case] source: &str, #[case] expected: &str) {
        let mut context = Context::new();
        context.insert("list", &["a", "b"]);
        context.insert("skipped", &Value::Null);

        assert_eq!(render_str("a.txt", source, &context).unwrap(), expected);
    }

    #[test]
    fn test_syntax_error_is_template_error() {
        let context = Context::new();
        let err = render_str("broken.txt", "{% if %}", &context).unwrap_err();
        assert!(matches!(err, RenderError::Template { .. }));
    }
}
