//! Apply, run, restore: one guarded transaction per mutant.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::copy_tree::Workspace;
use crate::error::EngineError;
use crate::mutants::{Diagnostic, MutantResult, MutationCandidate, MutationOutcome, SourceFile};
use crate::parser;
use crate::runner::{RunResult, TestCommand, truncate_output};
use crate::safety;

/// Holds a file in its mutated state. The original bytes go back on
/// [`MutationGuard::restore`], or on drop if the transaction unwinds early.
#[must_use = "dropping the guard restores the file immediately"]
pub struct MutationGuard {
    path: PathBuf,
    snapshot: Vec<u8>,
    backup: PathBuf,
    done: bool,
}

impl MutationGuard {
    /// Snapshot `path` (in memory and on disk), then write `mutated` over it.
    pub fn apply(path: &Path, mutated: &str) -> std::io::Result<Self> {
        let snapshot = std::fs::read(path)?;
        let backup = safety::write_backup(path, &snapshot)?;
        let guard = Self {
            path: path.to_path_buf(),
            snapshot,
            backup,
            done: false,
        };
        std::fs::write(&guard.path, mutated)?;
        safety::clear_pycache(&guard.path);
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> &[u8] {
        &self.snapshot
    }

    /// Put the original bytes back and verify them. On failure the on-disk
    /// snapshot is kept for recovery.
    pub fn restore(mut self) -> Result<(), EngineError> {
        self.done = true;
        self.write_back()
    }

    fn write_back(&self) -> Result<(), EngineError> {
        let failure = |source| EngineError::RestoreFailure {
            file: self.path.clone(),
            backup: self.backup.clone(),
            source,
        };
        std::fs::write(&self.path, &self.snapshot).map_err(failure)?;
        let on_disk = std::fs::read(&self.path).map_err(failure)?;
        if on_disk != self.snapshot {
            return Err(failure(std::io::Error::other(
                "restored contents differ from snapshot",
            )));
        }
        if let Err(e) = std::fs::remove_file(&self.backup) {
            tracing::warn!("Could not remove snapshot {}: {}", self.backup.display(), e);
        }
        safety::clear_pycache(&self.path);
        Ok(())
    }
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        if let Err(e) = self.write_back() {
            tracing::error!("{}", e);
        }
    }
}

pub fn generate_diff(original: &str, mutated: &str) -> String {
    use similar::TextDiff;
    let diff = TextDiff::from_lines(original, mutated);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => {
                output.push_str(&format!("- {}", change));
            }
            similar::ChangeTag::Insert => {
                output.push_str(&format!("+ {}", change));
            }
            _ => {}
        }
    }
    output
}

/// Runs single mutants against a workspace.
#[derive(Debug, Clone)]
pub struct Executor {
    command: TestCommand,
    timeout: Option<Duration>,
    max_output_bytes: usize,
}

impl Executor {
    pub fn new(command: TestCommand, timeout: Option<Duration>, max_output_bytes: usize) -> Self {
        Self {
            command,
            timeout,
            max_output_bytes,
        }
    }

    pub fn command(&self) -> &TestCommand {
        &self.command
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Apply `candidate` inside `workspace`, run the suite, classify, restore.
    ///
    /// Candidate-scoped problems come back as an `Errored` result. An `Err` is
    /// always fatal to the run (launch or restore failure). Either way the
    /// file is back to its pre-call bytes unless a restore failure is reported.
    pub fn execute(
        &self,
        workspace: &Workspace,
        source: &SourceFile,
        candidate: &MutationCandidate,
    ) -> Result<MutantResult, EngineError> {
        let start = Instant::now();
        let path = workspace.path_of(&candidate.file);

        let mutated = match parser::unparse_with(&source.original, &candidate.edit()) {
            Ok(m) => m,
            Err(reason) => {
                let err = EngineError::MutationApplication {
                    file: candidate.file.clone(),
                    line: candidate.line,
                    reason,
                };
                tracing::warn!("{} [{}]", err, candidate.rule);
                return Ok(errored(candidate, start, err.to_string(), String::new()));
            }
        };
        let diff = generate_diff(&source.original, &mutated);

        let guard = match MutationGuard::apply(&path, &mutated) {
            Ok(g) => g,
            Err(e) => {
                let err = EngineError::io(&path, e);
                tracing::warn!("Could not write mutant {}: {}", candidate.location(), err);
                return Ok(errored(candidate, start, err.to_string(), diff));
            }
        };

        let run = self.command.run(workspace.root(), self.timeout);
        guard.restore()?;
        let run = run?;

        if run.launch_failed() {
            return Err(EngineError::TestCommandLaunch {
                command: self.command.as_str().to_string(),
                reason: truncate_output(run.output.trim(), self.max_output_bytes),
            });
        }

        let outcome = classify(&run);
        let message = (outcome == MutationOutcome::TimedOut).then(|| {
            EngineError::Timeout {
                seconds: self.timeout.map_or(0.0, |t| t.as_secs_f64()),
            }
            .to_string()
        });
        tracing::debug!(
            "{} [{}] {} -> {}: {}",
            candidate.location(),
            candidate.rule,
            candidate.original_node,
            candidate.mutated_node,
            outcome
        );

        Ok(MutantResult {
            candidate: candidate.clone(),
            outcome,
            diagnostic: Diagnostic {
                duration_ms: start.elapsed().as_millis() as u64,
                output_excerpt: (!run.output.is_empty())
                    .then(|| truncate_output(&run.output, self.max_output_bytes)),
                message,
            },
            diff,
        })
    }
}

/// Nonzero exit or reported failures kill the mutant; a clean pass means it survived.
pub fn classify(run: &RunResult) -> MutationOutcome {
    if run.timed_out {
        MutationOutcome::TimedOut
    } else if run.passed() {
        MutationOutcome::Survived
    } else {
        MutationOutcome::Killed
    }
}

fn errored(
    candidate: &MutationCandidate,
    start: Instant,
    message: String,
    diff: String,
) -> MutantResult {
    MutantResult {
        candidate: candidate.clone(),
        outcome: MutationOutcome::Errored,
        diagnostic: Diagnostic {
            duration_ms: start.elapsed().as_millis() as u64,
            output_excerpt: None,
            message: Some(message),
        },
        diff,
    }
}
