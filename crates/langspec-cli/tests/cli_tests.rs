//! CLI integration tests
//!
//! Runs the `langspec` binary against temporary components with a shell
//! script standing in for the build engine.

#![cfg(unix)]

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const COMPONENT: &str = r#"
[component]
group = "org.example"
name = "calc"
version = "0.1.0"

[paths]
sources = ["src"]
"#;

/// Engine that writes an archive and otherwise succeeds silently
const ARCHIVING_ENGINE: &str = r#"
if [ "$1" = archive ]; then
    mkdir -p "$LANGSPEC_TARGET_DIR"
    echo archive > "$LANGSPEC_ARCHIVE"
fi
"#;

fn create_component() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("langspec.toml"), COMPONENT).unwrap();
    fs::create_dir_all(temp_dir.path().join("src")).unwrap();
    fs::write(temp_dir.path().join("src/calc.src"), "module calc").unwrap();
    temp_dir
}

fn langspec_cmd(dir: &Path, engine_script: &str) -> Command {
    let mut cmd = Command::cargo_bin("langspec").unwrap();
    cmd.arg("-C")
        .arg(dir)
        .arg("--components")
        .arg(dir.join("components"))
        .args(["--engine", "sh", "--engine-arg", "-c", "--engine-arg"])
        .arg(engine_script)
        .args(["--engine-arg", "engine"])
        .env_remove("RUST_LOG");
    for var in [
        "LANGSPEC_GROUP",
        "LANGSPEC_NAME",
        "LANGSPEC_VERSION",
        "LANGSPEC_ENGINE_VERSION",
        "LANGSPEC_COMPILE_DEPS",
        "LANGSPEC_SOURCE_DEPS",
        "LANGSPEC_LIBRARY_DEPS",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_stages() {
    Command::cargo_bin("langspec")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("dependency-load"))
        .stdout(predicate::str::contains("generate-sources"))
        .stdout(predicate::str::contains("archive"))
        .stdout(predicate::str::contains("build-examples"))
        .stdout(predicate::str::contains("clean"));
}

#[test]
fn test_unknown_stage_is_rejected() {
    let component = create_component();
    langspec_cmd(component.path(), ARCHIVING_ENGINE)
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("deploy"));
}

#[test]
fn test_archive_prints_artifact_location() {
    let component = create_component();
    let archive = component
        .path()
        .join("target")
        .join("org.example-calc-0.1.0.langspec");

    langspec_cmd(component.path(), ARCHIVING_ENGINE)
        .arg("archive")
        .assert()
        .success()
        .stdout(predicate::str::contains("org.example-calc-0.1.0.langspec"));

    assert!(archive.is_file());
    assert!(component.path().join("target/.langspec/inputs.json").is_file());
}

#[test]
fn test_version_override_renames_archive() {
    let component = create_component();

    langspec_cmd(component.path(), ARCHIVING_ENGINE)
        .args(["--component-version", "1.0.0", "archive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("org.example-calc-1.0.0.langspec"));

    // The declared file is untouched
    assert_eq!(
        fs::read_to_string(component.path().join("langspec.toml")).unwrap(),
        COMPONENT
    );
}

#[test]
fn test_non_archive_stage_prints_nothing() {
    let component = create_component();
    langspec_cmd(component.path(), ARCHIVING_ENGINE)
        .arg("build")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_engine_failure_reports_stage_and_diagnostics() {
    let component = create_component();
    let engine = r#"
if [ "$1" = build ]; then
    echo '{"success": false, "diagnostics": [{"severity": "warning", "message": "unused rule"}, {"severity": "error", "message": "unbound variable x"}]}'
fi
"#;

    langspec_cmd(component.path(), engine)
        .arg("archive")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Stage 'build' failed"))
        .stderr(predicate::str::contains("warning: unused rule"))
        .stderr(predicate::str::contains("error: unbound variable x"));

    assert!(!component.path().join("target/.langspec/inputs.json").exists());
}

#[test]
fn test_unresolved_dependency_fails_before_engine() {
    let component = create_component();
    let marker = component.path().join("engine-ran");
    let engine = format!("touch '{}'", marker.display());

    langspec_cmd(component.path(), &engine)
        .args(["--compile-dep", "org.example:missing:1.0", "build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Stage 'dependency-load' failed"))
        .stderr(predicate::str::contains("org.example:missing:1.0"));

    assert!(!marker.exists());
}

#[test]
fn test_missing_configuration() {
    let temp_dir = TempDir::new().unwrap();
    langspec_cmd(temp_dir.path(), ARCHIVING_ENGINE)
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load component configuration"));
}

#[test]
fn test_clean_removes_archive() {
    let component = create_component();
    langspec_cmd(component.path(), ARCHIVING_ENGINE)
        .arg("archive")
        .assert()
        .success();

    langspec_cmd(component.path(), ARCHIVING_ENGINE)
        .arg("clean")
        .assert()
        .success();

    assert!(!component
        .path()
        .join("target/org.example-calc-0.1.0.langspec")
        .exists());
    assert!(!component.path().join("target/.langspec/inputs.json").exists());
}
