use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use walkdir::WalkDir;

use stencil::error::{MetadataError, RenderError, StencilError};
use stencil::prompt::{InteractivePrompter, PromptOptions, ScriptedPrompter};
use stencil::{
    execute_generation, generate, plan_generation, GenerateOptions, GenerationReport, Outcome,
};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn options(name: &str, source: &Path, dest: &Path) -> GenerateOptions {
    GenerateOptions {
        name: name.to_string(),
        source_dir: source.to_path_buf(),
        dest_dir: dest.to_path_buf(),
        in_place: false,
    }
}

fn answers(pairs: &[(&str, Value)]) -> ScriptedPrompter {
    ScriptedPrompter::new(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())))
}

fn completed(outcome: Outcome<GenerationReport>) -> GenerationReport {
    match outcome {
        Outcome::Completed(report) => report,
        Outcome::Cancelled => panic!("generation was cancelled"),
    }
}

/// Relative path -> bytes for every file under `root`.
fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap();
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            (key, fs::read(e.path()).unwrap())
        })
        .collect()
}

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn template_without_descriptor_is_copied_byte_for_byte() {
    let src = tempfile::tempdir().unwrap();
    for (rel, content) in snapshot(&fixture_path("plain-template")) {
        write(src.path(), &rel, &content);
    }
    let binary: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    write(src.path(), "assets/logo.png", &binary);

    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("copy");
    let report = completed(
        generate(
            &options("my-app", src.path(), &dest),
            &mut ScriptedPrompter::default(),
        )
        .unwrap(),
    );

    assert_eq!(snapshot(&dest), snapshot(src.path()));
    assert!(report.project.files_rendered.is_empty());
    assert_eq!(report.project.files_copied.len(), 4);
    assert!(report.complete_message.is_none());
}

#[test]
fn webpack_template_with_defaults() {
    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("my-app");
    let report = completed(
        generate(
            &options("my-app", &fixture_path("webpack-template"), &dest),
            &mut ScriptedPrompter::default(),
        )
        .unwrap(),
    );

    assert_eq!(
        fs::read_to_string(dest.join("package.json")).unwrap(),
        "{\n  \"name\": \"my-app\",\n  \"description\": \"A stencil project\",\n  \"author\": \"Anonymous\",\n  \"private\": true\n}\n"
    );
    assert_eq!(
        fs::read_to_string(dest.join("README.md")).unwrap(),
        "# My App\n\n> A stencil project\n\nMy App by Anonymous\n"
    );
    assert_eq!(
        fs::read_to_string(dest.join("src/MyApp.js")).unwrap(),
        "export const MyApp = 'my-app'\n"
    );
    assert!(fs::read_to_string(dest.join("src/main.js"))
        .unwrap()
        .contains("import router from './router'"));
    assert!(dest.join("src/router/index.js").is_file());
    assert!(!dest.join(".eslintrc.js").exists());
    assert!(!dest.join("stencil.toml").exists());
    assert_eq!(
        fs::read_to_string(dest.join("static/raw.txt")).unwrap(),
        "{{ this is not a template }}\n"
    );

    assert_eq!(
        report.project.files_skipped,
        vec![PathBuf::from(".eslintrc.js.tera")]
    );
    let message = report.complete_message.unwrap();
    assert!(message.contains("cd my-app"), "{message}");
}

#[test]
fn false_condition_leaves_file_out() {
    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("no-router");
    let mut prompter = answers(&[("router", Value::Bool(false))]);
    completed(
        generate(
            &options("no-router", &fixture_path("webpack-template"), &dest),
            &mut prompter,
        )
        .unwrap(),
    );

    assert!(!dest.join("src/router").exists());
    let main = fs::read_to_string(dest.join("src/main.js")).unwrap();
    assert!(!main.contains("router"), "{main}");
}

#[test]
fn answers_from_overrides_select_lint_preset() {
    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("linted");
    let overrides = [("lint", "yes"), ("lintConfig", "Airbnb (https://github.com/airbnb/javascript)")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let mut prompter = InteractivePrompter::new(PromptOptions {
        data_overrides: overrides,
        use_defaults: true,
    });

    completed(generate(&options("linted", &fixture_path("webpack-template"), &dest), &mut prompter).unwrap());

    assert_eq!(
        fs::read_to_string(dest.join(".eslintrc.js")).unwrap(),
        "module.exports = {\n  extends: 'airbnb'\n}\n"
    );
}

#[test]
fn lint_preset_none_excludes_config_file() {
    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("diy");
    let mut prompter = answers(&[
        ("lint", Value::Bool(true)),
        ("lintConfig", Value::String("none".into())),
    ]);
    completed(generate(&options("diy", &fixture_path("webpack-template"), &dest), &mut prompter).unwrap());
    assert!(!dest.join(".eslintrc.js").exists());
}

#[test]
fn generation_is_deterministic() {
    let out = tempfile::tempdir().unwrap();
    let first = out.path().join("one").join("my-app");
    let second = out.path().join("two").join("my-app");
    let scripted = [
        ("description", Value::String("Same every time".into())),
        ("lint", Value::Bool(true)),
    ];

    for dest in [&first, &second] {
        completed(
            generate(
                &options("my-app", &fixture_path("webpack-template"), dest),
                &mut answers(&scripted),
            )
            .unwrap(),
        );
    }

    let a = snapshot(&first);
    assert!(!a.is_empty());
    assert_eq!(a, snapshot(&second));
}

#[test]
fn package_json_name_is_substituted() {
    let src = tempfile::tempdir().unwrap();
    write(
        src.path(),
        "stencil.toml",
        b"[template]\nname = \"pkg\"\n\n[files]\nrender = [\"package.json\"]\n",
    );
    write(src.path(), "package.json", br#"{"name": "{{name}}"}"#);

    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("my-app");
    completed(generate(&options("my-app", src.path(), &dest), &mut ScriptedPrompter::default()).unwrap());

    assert_eq!(
        fs::read_to_string(dest.join("package.json")).unwrap(),
        r#"{"name": "my-app"}"#
    );
}

#[test]
fn unresolved_token_fails_before_any_write() {
    let src = tempfile::tempdir().unwrap();
    write(src.path(), "stencil.toml", b"[template]\nname = \"broken\"\n");
    write(src.path(), "a-fine.txt.tera", b"{{ name }}");
    write(src.path(), "b-broken.txt.tera", b"hello {{ nobody_declared_this }}");
    write(src.path(), "c-later.txt", b"plain");

    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("broken");
    let err = generate(&options("broken", src.path(), &dest), &mut ScriptedPrompter::default())
        .unwrap_err();

    match err {
        StencilError::Render(RenderError::UnresolvedToken { file, token }) => {
            assert_eq!(file, "b-broken.txt.tera");
            assert_eq!(token, "nobody_declared_this");
        }
        other => panic!("expected UnresolvedToken, got {other:?}"),
    }
    assert!(!dest.exists());
}

#[test]
fn unresolved_condition_in_tag_fails_before_any_write() {
    let src = tempfile::tempdir().unwrap();
    write(src.path(), "stencil.toml", b"[template]\nname = \"tagged\"\n");
    write(src.path(), "a.txt.tera", b"x{% if nobody_declared %}y{% endif %}z");

    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("tagged");
    let err = generate(&options("tagged", src.path(), &dest), &mut ScriptedPrompter::default())
        .unwrap_err();

    match err {
        StencilError::Render(RenderError::UnresolvedToken { file, token }) => {
            assert_eq!(file, "a.txt.tera");
            assert_eq!(token, "nobody_declared");
        }
        other => panic!("expected UnresolvedToken, got {other:?}"),
    }
    assert!(!dest.exists());
}

#[test]
fn answers_cannot_place_files_outside_destination() {
    let src = tempfile::tempdir().unwrap();
    write(
        src.path(),
        "stencil.toml",
        b"[template]\nname = \"nested\"\n\n[prompts.dir]\ntype = \"input\"\n",
    );
    write(src.path(), "template/{{ dir }}/owned.txt", b"owned");

    let out = tempfile::tempdir().unwrap();
    let absolute = out.path().join("abs");
    for value in ["../outside".to_string(), absolute.display().to_string()] {
        let dest = out.path().join("project");
        let err = generate(
            &options("project", src.path(), &dest),
            &mut answers(&[("dir", Value::String(value.clone()))]),
        )
        .unwrap_err();

        assert!(
            matches!(err, StencilError::Render(RenderError::UnsafePath { .. })),
            "{value}: {err:?}"
        );
        assert!(!dest.exists());
    }
    assert!(!out.path().join("outside").exists());
    assert!(!absolute.exists());
}

#[test]
fn write_failure_keeps_earlier_files_and_stops() {
    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("partial");
    // A directory where a later file belongs makes that write fail.
    fs::create_dir_all(dest.join("nested/deep/file.txt")).unwrap();

    let plan = match plan_generation(
        &options("partial", &fixture_path("plain-template"), &dest),
        &mut ScriptedPrompter::default(),
    )
    .unwrap()
    {
        Outcome::Completed(plan) => plan,
        Outcome::Cancelled => panic!("cancelled"),
    };
    let err = execute_generation(plan).unwrap_err();

    match err {
        StencilError::Render(RenderError::Write { path, .. }) => {
            assert_eq!(path, dest.join("nested/deep/file.txt"));
        }
        other => panic!("expected Write, got {other:?}"),
    }
    assert!(dest.join("README.md").is_file());
    assert!(!dest.join("src/index.js").exists());
}

#[test]
fn cyclic_derivation_fails_before_any_write() {
    let src = tempfile::tempdir().unwrap();
    write(
        src.path(),
        "stencil.toml",
        br#"
[template]
name = "cycle"

[derived.a]
template = "{{ b }}-x"

[derived.b]
template = "{{ a }}-y"
"#,
    );
    write(src.path(), "template/file.txt", b"content");

    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("cycle");
    let err = generate(&options("cycle", src.path(), &dest), &mut ScriptedPrompter::default())
        .unwrap_err();

    match err {
        StencilError::Metadata(MetadataError::CyclicDerivation { chain }) => {
            assert!(chain.contains(&"a".to_string()) && chain.contains(&"b".to_string()));
        }
        other => panic!("expected CyclicDerivation, got {other:?}"),
    }
    assert!(!dest.exists());
}

#[test]
fn malformed_descriptor_is_metadata_error() {
    let src = tempfile::tempdir().unwrap();
    write(
        src.path(),
        "stencil.toml",
        b"[template]\nname = \"bad\"\n\n[[files.conditional]]\npattern = \"x\"\nwhen = \"(router\"\n",
    );

    let out = tempfile::tempdir().unwrap();
    let err = generate(
        &options("bad", src.path(), &out.path().join("bad")),
        &mut ScriptedPrompter::default(),
    )
    .unwrap_err();
    assert!(matches!(err, StencilError::Metadata(_)), "{err:?}");
}

#[test]
fn cancelled_prompt_writes_nothing() {
    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("my-app");
    let outcome = generate(
        &options("my-app", &fixture_path("webpack-template"), &dest),
        &mut ScriptedPrompter::cancelling(),
    )
    .unwrap();

    assert!(matches!(outcome, Outcome::Cancelled));
    assert!(!dest.exists());
}

#[test]
fn planning_does_not_touch_the_destination() {
    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("planned");
    let plan = match plan_generation(
        &options("planned", &fixture_path("webpack-template"), &dest),
        &mut ScriptedPrompter::default(),
    )
    .unwrap()
    {
        Outcome::Completed(plan) => plan,
        Outcome::Cancelled => panic!("cancelled"),
    };

    assert!(!dest.exists());
    assert_eq!(plan.answers["lintConfig"], Value::Null);
    assert_eq!(plan.context["moduleName"], Value::String("Planned".into()));
    assert!(plan
        .render_plan
        .files
        .iter()
        .any(|f| f.relative_path == Path::new("src").join("Planned.js")));
}

#[test]
fn existing_destination_files_are_overwritten() {
    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("my-app");
    write(&dest, "package.json", b"old");
    write(&dest, "keep-me.txt", b"untouched");

    completed(
        generate(
            &options("my-app", &fixture_path("webpack-template"), &dest),
            &mut ScriptedPrompter::default(),
        )
        .unwrap(),
    );

    assert!(fs::read_to_string(dest.join("package.json"))
        .unwrap()
        .contains("\"name\": \"my-app\""));
    assert_eq!(fs::read_to_string(dest.join("keep-me.txt")).unwrap(), "untouched");
}

#[test]
fn empty_project_name_is_rejected() {
    let out = tempfile::tempdir().unwrap();
    let err = generate(
        &options("", &fixture_path("plain-template"), out.path()),
        &mut ScriptedPrompter::default(),
    )
    .unwrap_err();
    assert!(matches!(err, StencilError::EmptyProjectName));
}

#[test]
fn missing_source_is_source_not_found() {
    let out = tempfile::tempdir().unwrap();
    let err = generate(
        &options("x", &out.path().join("no-such-template"), &out.path().join("x")),
        &mut ScriptedPrompter::default(),
    )
    .unwrap_err();
    assert!(matches!(err, StencilError::SourceNotFound { .. }));
}
