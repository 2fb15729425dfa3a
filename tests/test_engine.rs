use radiation::operators::Registry;
use radiation::report::RunStatus;
use radiation::{Engine, MutationOutcome, Settings};
use std::path::Path;
use tempfile::TempDir;

const APP: &str = "def add(a, b):\n    return a + b\n\ndef both(a, b):\n    return a and b\n";

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("app.py"), APP).unwrap();
    std::fs::create_dir(dir.path().join("tests")).unwrap();
    std::fs::write(dir.path().join("tests/test_app.py"), "assert 1 + 1 == 2\n").unwrap();
    dir
}

fn settings(root: &Path, command: &str) -> Settings {
    Settings {
        run_command: command.to_string(),
        workers: Some(2),
        ..Settings::defaults(root)
    }
}

#[test]
fn run_classifies_every_candidate_and_restores_sources() {
    let dir = project();
    let engine = Engine::new(settings(dir.path(), "grep -q 'a + b' app.py")).unwrap();
    let report = engine.run().unwrap();

    assert_eq!(report.status(), RunStatus::Completed);
    let outcomes: Vec<(&str, MutationOutcome)> = report
        .results()
        .iter()
        .map(|r| (r.candidate.rule.as_str(), r.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("arithmetic", MutationOutcome::Killed),
            ("logical", MutationOutcome::Survived),
        ]
    );
    assert_eq!(std::fs::read_to_string(dir.path().join("app.py")).unwrap(), APP);
}

#[test]
fn tests_directory_is_never_mutated() {
    let dir = project();
    let engine = Engine::new(settings(dir.path(), "true")).unwrap();
    let plan = engine.plan();
    assert!(plan.candidates().all(|c| !c.file.starts_with("tests")));
}

#[test]
fn failing_baseline_aborts_before_mutation() {
    let dir = project();
    let engine = Engine::new(settings(dir.path(), "false")).unwrap();
    let err = engine.run().unwrap_err();
    assert_eq!(err.code(), "baseline_failed");
}

#[test]
fn baseline_can_be_skipped() {
    let dir = project();
    let engine = Engine::new(Settings {
        baseline: false,
        ..settings(dir.path(), "false")
    })
    .unwrap();
    let report = engine.run().unwrap();
    assert_eq!(report.counts().killed, 2);
    assert_eq!(report.score(), Some(1.0));
}

#[test]
fn interrupted_run_is_recovered_first() {
    let dir = project();
    std::fs::write(dir.path().join("app.py"), APP.replace("a + b", "a - b")).unwrap();
    std::fs::write(dir.path().join(".app.py.radiation.bak"), APP).unwrap();

    let engine = Engine::new(settings(dir.path(), "true")).unwrap();
    let report = engine.run().unwrap();

    assert_eq!(report.results()[0].candidate.original_node, "a + b");
    assert_eq!(std::fs::read_to_string(dir.path().join("app.py")).unwrap(), APP);
    assert!(!dir.path().join(".app.py.radiation.bak").exists());
}

#[test]
fn in_place_run_leaves_no_trace() {
    let dir = project();
    let engine = Engine::new(Settings {
        in_place: true,
        ..settings(dir.path(), "grep -q 'a and b' app.py")
    })
    .unwrap();
    let report = engine.run().unwrap();

    assert_eq!(report.counts().total, 2);
    assert_eq!(report.counts().killed, 1);
    assert_eq!(std::fs::read_to_string(dir.path().join("app.py")).unwrap(), APP);
    assert!(!dir.path().join(".app.py.radiation.bak").exists());
}

#[test]
fn project_without_candidates_skips_baseline() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("consts.py"), "NAME = 'x'\n").unwrap();
    let engine = Engine::new(settings(dir.path(), "false")).unwrap();
    let report = engine.run().unwrap();
    assert_eq!(report.counts().total, 0);
    assert_eq!(report.score(), None);
}

#[test]
fn custom_registry_replaces_rules() {
    let dir = project();
    let engine = Engine::new(settings(dir.path(), "true"))
        .unwrap()
        .with_registry(Registry::from_names(&["logical"]).unwrap());
    let plan = engine.plan();
    assert_eq!(plan.candidate_count(), 1);
}

#[test]
fn invalid_settings_are_rejected_up_front() {
    let dir = project();
    let err = Engine::new(Settings {
        tests_timeout: Some(-2.0),
        ..settings(dir.path(), "true")
    })
    .err()
    .unwrap();
    assert_eq!(err.code(), "configuration");
}

#[test]
fn stop_before_run_aborts_with_no_results() {
    let dir = project();
    let engine = Engine::new(Settings {
        baseline: false,
        ..settings(dir.path(), "true")
    })
    .unwrap();
    engine.stop_signal().stop();
    let report = engine.run().unwrap();
    assert_eq!(report.status(), RunStatus::Aborted);
    assert!(report.results().is_empty());
}
