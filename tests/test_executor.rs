use radiation::copy_tree::Workspace;
use radiation::discovery;
use radiation::error::EngineError;
use radiation::executor::{self, Executor, MutationGuard};
use radiation::mutants::{MutationCandidate, MutationOutcome, SourceFile};
use radiation::operators::{Edits, MutationRule, Registry};
use radiation::parser::{NodeEdit, SyntaxNode};
use radiation::runner::TestCommand;
use radiation::safety;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const APP: &str = "def add(a, b):\n    return a + b\n";

fn project(content: &str) -> (TempDir, SourceFile) {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("app.py"), content).unwrap();
    let source = SourceFile::load(dir.path(), Path::new("app.py")).unwrap();
    (dir, source)
}

fn candidates(source: &SourceFile, registry: &Registry) -> Vec<MutationCandidate> {
    discovery::discover_mutations(source, registry, 0).unwrap()
}

fn executor(command: &str, timeout: Option<Duration>) -> Executor {
    Executor::new(TestCommand::new(command), timeout, 4000)
}

fn read(root: &Path) -> Vec<u8> {
    std::fs::read(root.join("app.py")).unwrap()
}

// --- outcomes ---

#[test]
fn suite_noticing_mutant_kills_it() {
    let (dir, source) = project(APP);
    let ws = Workspace::in_place(dir.path());
    let c = &candidates(&source, &Registry::builtin())[0];

    let result = executor("grep -q 'a + b' app.py", None)
        .execute(&ws, &source, c)
        .unwrap();

    assert_eq!(result.outcome, MutationOutcome::Killed);
    assert_eq!(read(dir.path()), APP.as_bytes());
    assert_eq!(result.diff, "-     return a + b\n+     return a - b\n");
}

#[test]
fn suite_missing_mutant_lets_it_survive() {
    let (dir, source) = project(APP);
    let ws = Workspace::in_place(dir.path());
    let c = &candidates(&source, &Registry::builtin())[0];

    let result = executor("true", None).execute(&ws, &source, c).unwrap();

    assert_eq!(result.outcome, MutationOutcome::Survived);
    assert_eq!(read(dir.path()), APP.as_bytes());
}

#[test]
fn mutant_is_on_disk_while_suite_runs() {
    let (dir, source) = project(APP);
    let ws = Workspace::in_place(dir.path());
    let c = &candidates(&source, &Registry::builtin())[0];

    let result = executor("grep -q 'a - b' app.py", None)
        .execute(&ws, &source, c)
        .unwrap();

    assert_eq!(result.outcome, MutationOutcome::Survived);
    assert!(!safety::backup_path(&dir.path().join("app.py")).exists());
}

#[test]
fn slow_suite_times_out_and_file_is_restored() {
    let (dir, source) = project(APP);
    let ws = Workspace::in_place(dir.path());
    let c = &candidates(&source, &Registry::builtin())[0];

    let result = executor(
        "grep -q 'a - b' app.py && sleep 30 || true",
        Some(Duration::from_millis(500)),
    )
    .execute(&ws, &source, c)
    .unwrap();

    assert_eq!(result.outcome, MutationOutcome::TimedOut);
    assert!(result.diagnostic.message.unwrap().contains("timed out"));
    assert_eq!(read(dir.path()), APP.as_bytes());
}

#[test]
fn unlaunchable_command_is_fatal_and_file_is_restored() {
    let (dir, source) = project(APP);
    let ws = Workspace::in_place(dir.path());
    let c = &candidates(&source, &Registry::builtin())[0];

    let err = executor("definitely-not-a-real-test-runner-xyz", None)
        .execute(&ws, &source, c)
        .unwrap_err();

    assert!(matches!(err, EngineError::TestCommandLaunch { .. }));
    assert!(err.is_fatal());
    assert_eq!(read(dir.path()), APP.as_bytes());
}

struct CloseParen;

impl MutationRule for CloseParen {
    fn name(&self) -> &'static str {
        "close_paren"
    }

    fn mutate<'t>(&self, node: SyntaxNode<'t>) -> Edits<'t> {
        if node.kind() != "binary_operator" {
            return Box::new(std::iter::empty());
        }
        let Some(op) = node.field("operator") else {
            return Box::new(std::iter::empty());
        };
        Box::new(std::iter::once(NodeEdit {
            span: op.span(),
            replacement: ")".to_string(),
        }))
    }
}

#[test]
fn invalid_mutant_is_errored_without_touching_disk() {
    let (dir, source) = project(APP);
    let ws = Workspace::in_place(dir.path());
    let mut registry = Registry::new();
    registry.register(Box::new(CloseParen));
    let c = &candidates(&source, &registry)[0];

    let result = executor("false", None).execute(&ws, &source, c).unwrap();

    assert_eq!(result.outcome, MutationOutcome::Errored);
    assert!(result.diagnostic.message.unwrap().contains("invalid source"));
    assert_eq!(read(dir.path()), APP.as_bytes());
}

#[test]
fn missing_target_file_is_errored() {
    let (dir, source) = project(APP);
    let c = &candidates(&source, &Registry::builtin())[0];
    let elsewhere = TempDir::new().unwrap();
    let ws = Workspace::in_place(elsewhere.path());
    drop(dir);

    let result = executor("true", None).execute(&ws, &source, c).unwrap();
    assert_eq!(result.outcome, MutationOutcome::Errored);
}

#[test]
fn restore_is_byte_identical() {
    let content = "# -*- coding: utf-8 -*-\r\nx = 'héllo'  \r\ny = a * b\t\r\n\r\n";
    let (dir, source) = project(content);
    let ws = Workspace::in_place(dir.path());

    for c in &candidates(&source, &Registry::builtin()) {
        executor("false", None).execute(&ws, &source, c).unwrap();
        assert_eq!(read(dir.path()), content.as_bytes());
    }
}

#[test]
fn workspace_copy_keeps_project_untouched() {
    let (dir, source) = project(APP);
    let ws = Workspace::isolated(dir.path(), "exec-test").unwrap();
    let c = &candidates(&source, &Registry::builtin())[0];

    let result = executor("grep -q 'a + b' app.py", None)
        .execute(&ws, &source, c)
        .unwrap();

    assert_eq!(result.outcome, MutationOutcome::Killed);
    assert_eq!(read(dir.path()), APP.as_bytes());
    assert_eq!(read(ws.root()), APP.as_bytes());
}

// --- guard ---

#[test]
fn guard_restores_on_drop() {
    let (dir, _) = project(APP);
    let path = dir.path().join("app.py");
    {
        let guard = MutationGuard::apply(&path, "mutated").unwrap();
        assert_eq!(std::fs::read_to_string(guard.path()).unwrap(), "mutated");
        assert!(safety::backup_path(&path).exists());
    }
    assert_eq!(read(dir.path()), APP.as_bytes());
    assert!(!safety::backup_path(&path).exists());
}

#[test]
fn guard_restores_when_panic_unwinds() {
    let (dir, _) = project(APP);
    let path: PathBuf = dir.path().join("app.py");
    let inner = path.clone();
    let outcome = std::panic::catch_unwind(move || {
        let _guard = MutationGuard::apply(&inner, "mutated").unwrap();
        panic!("suite runner blew up");
    });
    assert!(outcome.is_err());
    assert_eq!(read(dir.path()), APP.as_bytes());
}

#[test]
fn guard_snapshot_is_original_bytes() {
    let (dir, _) = project(APP);
    let guard = MutationGuard::apply(&dir.path().join("app.py"), "x").unwrap();
    assert_eq!(guard.snapshot(), APP.as_bytes());
    guard.restore().unwrap();
    assert_eq!(read(dir.path()), APP.as_bytes());
}

// --- diff ---

#[test]
fn generate_diff_identical_returns_empty() {
    assert_eq!(executor::generate_diff("x = 1\n", "x = 1\n"), "");
}

#[test]
fn generate_diff_shows_changed_line_only() {
    let diff = executor::generate_diff("a\nb + c\nd\n", "a\nb - c\nd\n");
    assert_eq!(diff, "- b + c\n+ b - c\n");
}
