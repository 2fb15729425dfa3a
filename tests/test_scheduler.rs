use radiation::discovery::{self, PathFilter, Plan};
use radiation::executor::Executor;
use radiation::mutants::MutationOutcome;
use radiation::operators::Registry;
use radiation::report::RunStatus;
use radiation::runner::TestCommand;
use radiation::scheduler::{RunState, Scheduler, StopSignal};
use std::path::Path;
use tempfile::TempDir;

const CALC: &str = "def calc(a, b):\n    return a + b * 2\n";
const LOGIC: &str = "def both(a, b):\n    return a and b or a - b\n";

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("calc.py"), CALC).unwrap();
    std::fs::write(dir.path().join("logic.py"), LOGIC).unwrap();
    dir
}

fn plan(root: &Path) -> Plan {
    let filter = PathFilter {
        include: vec![".".to_string()],
        exclude: vec![],
        tests_dir: Some("tests".to_string()),
    };
    discovery::enumerate(root, &filter, &Registry::builtin())
}

/// Kills every mutant that touches `calc.py`'s `+`.
fn executor() -> Executor {
    Executor::new(TestCommand::new("grep -q 'a + b' calc.py"), None, 4000)
}

fn outcomes(results: &[radiation::MutantResult]) -> Vec<(usize, MutationOutcome)> {
    let mut pairs: Vec<_> = results.iter().map(|r| (r.candidate.index, r.outcome)).collect();
    pairs.sort_by_key(|(index, _)| *index);
    pairs
}

#[test]
fn parallel_run_matches_single_worker_run() {
    let dir = project();
    let plan = plan(dir.path());
    assert_eq!(plan.files.len(), 2);

    let single = Scheduler::new(executor(), dir.path(), 1).run(&plan).unwrap();
    let parallel = Scheduler::new(executor(), dir.path(), 2).run(&plan).unwrap();

    assert_eq!(single.status, RunStatus::Completed);
    assert_eq!(parallel.status, RunStatus::Completed);
    assert_eq!(single.results.len(), plan.candidate_count());
    assert_eq!(outcomes(&single.results), outcomes(&parallel.results));

    assert_eq!(std::fs::read_to_string(dir.path().join("calc.py")).unwrap(), CALC);
    assert_eq!(std::fs::read_to_string(dir.path().join("logic.py")).unwrap(), LOGIC);
}

#[test]
fn only_the_targeted_mutant_is_killed() {
    let dir = project();
    let plan = plan(dir.path());
    let output = Scheduler::new(executor(), dir.path(), 2).run(&plan).unwrap();
    let killed: Vec<String> = output
        .results
        .iter()
        .filter(|r| r.outcome == MutationOutcome::Killed)
        .map(|r| r.candidate.location())
        .collect();
    assert_eq!(killed, vec!["calc.py:2:14"]);
}

/// Fails whenever both files differ from their originals at the same time,
/// which only happens if two workers' mutations meet in one tree.
const SEES_ONE_MUTATION: &str = r#"sleep 0.2
changed=0
grep -qxF '    return a + b * 2' calc.py || changed=$((changed + 1))
grep -qxF '    return a and b or a - b' logic.py || changed=$((changed + 1))
test "$changed" -le 1"#;

#[test]
fn concurrent_workers_never_see_each_others_mutations() {
    let dir = project();
    let plan = plan(dir.path());
    let executor = Executor::new(TestCommand::new(SEES_ONE_MUTATION), None, 4000);
    let output = Scheduler::new(executor, dir.path(), 2).run(&plan).unwrap();

    assert_eq!(output.status, RunStatus::Completed);
    assert_eq!(output.results.len(), plan.candidate_count());
    for r in &output.results {
        assert_eq!(r.outcome, MutationOutcome::Survived, "{}", r.candidate.location());
    }
    assert_eq!(std::fs::read_to_string(dir.path().join("calc.py")).unwrap(), CALC);
    assert_eq!(std::fs::read_to_string(dir.path().join("logic.py")).unwrap(), LOGIC);
}

#[test]
fn in_place_run_restores_project() {
    let dir = project();
    let plan = plan(dir.path());
    let scheduler = Scheduler::new(executor(), dir.path(), 4).in_place(true);
    let output = scheduler.run(&plan).unwrap();

    assert_eq!(output.results.len(), plan.candidate_count());
    assert_eq!(scheduler.state(), RunState::Completed);
    assert_eq!(std::fs::read_to_string(dir.path().join("calc.py")).unwrap(), CALC);
    assert_eq!(std::fs::read_to_string(dir.path().join("logic.py")).unwrap(), LOGIC);
}

#[test]
fn stopped_run_is_aborted_with_partial_results() {
    let dir = project();
    let plan = plan(dir.path());
    let stop = StopSignal::new();
    stop.stop();
    let scheduler = Scheduler::new(executor(), dir.path(), 2).with_stop_signal(stop);
    let output = scheduler.run(&plan).unwrap();

    assert_eq!(output.status, RunStatus::Aborted);
    assert!(output.results.len() < plan.candidate_count());
    assert_eq!(scheduler.state(), RunState::Aborted);
}

#[test]
fn fatal_error_aborts_run() {
    let dir = project();
    let plan = plan(dir.path());
    let executor = Executor::new(
        TestCommand::new("definitely-not-a-real-test-runner-xyz"),
        None,
        4000,
    );
    let scheduler = Scheduler::new(executor, dir.path(), 2);
    let err = scheduler.run(&plan).unwrap_err();

    assert_eq!(err.code(), "test_command_launch");
    assert_eq!(scheduler.state(), RunState::Aborted);
    assert!(scheduler.stop_signal().is_stopped());
    assert_eq!(std::fs::read_to_string(dir.path().join("calc.py")).unwrap(), CALC);
}

#[test]
fn empty_plan_completes() {
    let dir = TempDir::new().unwrap();
    let scheduler = Scheduler::new(executor(), dir.path(), 3);
    assert_eq!(scheduler.state(), RunState::Idle);
    let output = scheduler.run(&Plan::default()).unwrap();
    assert!(output.results.is_empty());
    assert_eq!(output.status, RunStatus::Completed);
}
