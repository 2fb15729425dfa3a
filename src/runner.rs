use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::error::EngineError;

/// Shell exit statuses meaning the command itself could not be executed.
const NOT_EXECUTABLE: i32 = 126;
const NOT_FOUND: i32 = 127;

/// How long output may still trickle in once the deadline has passed.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// The configured test command, run through the platform shell.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCommand {
    command: String,
}

/// Raw outcome of one test-command invocation.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub output: String,
    pub timed_out: bool,
    pub summary: Option<SuiteSummary>,
}

/// Pass/fail counts reported by the test runner itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuiteSummary {
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
}

impl SuiteSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.errors > 0
    }
}

impl RunResult {
    pub fn passed(&self) -> bool {
        !self.timed_out
            && self.exit_code == Some(0)
            && !self.summary.is_some_and(|s| s.has_failures())
    }

    /// The shell could not find or execute the command.
    pub fn launch_failed(&self) -> bool {
        matches!(self.exit_code, Some(NOT_EXECUTABLE) | Some(NOT_FOUND))
    }
}

impl TestCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Make a relative program path (e.g. `.venv/bin/pytest`) absolute against
    /// the project root, so it still resolves from a working copy.
    pub fn resolve(command: &str, project_root: &Path) -> Self {
        let trimmed = command.trim_start();
        let (program, rest) = match trimmed.find(char::is_whitespace) {
            Some(i) => trimmed.split_at(i),
            None => (trimmed, ""),
        };
        let p = Path::new(program);
        if program.contains('/') && !p.is_absolute() {
            let from_root = project_root.join(p);
            if from_root.exists() {
                return Self::new(format!("{}{}", from_root.to_string_lossy(), rest));
            }
        }
        Self::new(command)
    }

    pub fn as_str(&self) -> &str {
        &self.command
    }

    fn build(&self, cwd: &Path) -> Command {
        #[cfg(unix)]
        let mut cmd = {
            use std::os::unix::process::CommandExt;
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&self.command);
            // Own process group so a timeout can take down everything the shell started.
            cmd.process_group(0);
            cmd
        };
        #[cfg(not(unix))]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&self.command);
            cmd
        };
        cmd.current_dir(cwd)
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Run the command in `cwd`, killing it once `timeout` elapses.
    ///
    /// Anything the command left running in its process group is killed when
    /// the shell exits, so background jobs cannot hold the output pipes open.
    pub fn run(&self, cwd: &Path, timeout: Option<Duration>) -> Result<RunResult, EngineError> {
        let start = Instant::now();
        let mut child = self
            .build(cwd)
            .spawn()
            .map_err(|e| EngineError::TestCommandLaunch {
                command: self.command.clone(),
                reason: e.to_string(),
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let (exit_code, mut timed_out) = loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    kill_leftovers(&child);
                    break (status.code(), false);
                }
                Ok(None) => {
                    if timeout.is_some_and(|limit| start.elapsed() > limit) {
                        kill_tree(&mut child);
                        break (None, true);
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    kill_tree(&mut child);
                    return Err(EngineError::io(PathBuf::from(cwd), e));
                }
            }
        };

        let deadline = timeout.map(|limit| (start + limit).max(Instant::now() + DRAIN_GRACE));
        let out = collect(&stdout, deadline);
        let err = collect(&stderr, deadline);
        if out.is_none() || err.is_none() {
            tracing::warn!(
                "Output of '{}' still open after the deadline, treating as timed out",
                self.command
            );
            timed_out = true;
        }
        let duration = start.elapsed();

        let mut output = String::from_utf8_lossy(&out.unwrap_or_default()).into_owned();
        let err = err.unwrap_or_default();
        if !err.is_empty() {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&String::from_utf8_lossy(&err));
        }
        let summary = parse_summary(&output);

        Ok(RunResult {
            exit_code,
            duration,
            output,
            timed_out,
            summary,
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut p) = pipe {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
    }
    rx
}

/// Everything read from a pipe, or `None` if it is still open at `deadline`.
fn collect(rx: &Receiver<Vec<u8>>, deadline: Option<Instant>) -> Option<Vec<u8>> {
    let received = match deadline {
        Some(d) => rx.recv_timeout(d.saturating_duration_since(Instant::now())),
        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
    };
    match received {
        Ok(buf) => Some(buf),
        Err(RecvTimeoutError::Disconnected) => Some(Vec::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

/// Send SIGKILL to every process in group `pgid`. A group that no longer
/// exists is not an error.
#[cfg(unix)]
fn kill_group(pgid: u32) -> std::io::Result<()> {
    let pgid = libc::pid_t::try_from(pgid).map_err(std::io::Error::other)?;
    // SAFETY: killpg takes plain integers and touches no memory of ours.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

#[cfg(unix)]
fn kill_leftovers(child: &Child) {
    if let Err(e) = kill_group(child.id()) {
        tracing::warn!("Could not kill process group {}: {}", child.id(), e);
    }
}

#[cfg(not(unix))]
fn kill_leftovers(_child: &Child) {}

fn kill_tree(child: &mut Child) {
    kill_leftovers(child);
    let _ = child.kill();
    let _ = child.wait();
}

/// Find a pytest-style result line such as `=== 1 failed, 3 passed in 0.12s ===`.
pub fn parse_summary(output: &str) -> Option<SuiteSummary> {
    output.lines().rev().find_map(parse_summary_line)
}

fn parse_summary_line(line: &str) -> Option<SuiteSummary> {
    let line = line.trim().trim_matches('=').trim();
    let (counts, _) = line.rsplit_once(" in ")?;
    let mut summary = SuiteSummary::default();
    let mut recognized = false;
    for part in counts.split(", ") {
        let (n, word) = part.trim().split_once(' ')?;
        let n: usize = n.parse().ok()?;
        match word {
            "passed" => summary.passed = n,
            "failed" => summary.failed = n,
            "error" | "errors" => summary.errors = n,
            "skipped" | "deselected" | "xfailed" | "xpassed" | "warning" | "warnings"
            | "rerun" => continue,
            _ => return None,
        }
        recognized = true;
    }
    recognized.then_some(summary)
}

/// Keep the tail of `output`, where test runners put their verdict.
pub fn truncate_output(output: &str, max_bytes: usize) -> String {
    if output.len() <= max_bytes {
        return output.to_string();
    }
    let mut start = output.len() - max_bytes;
    while !output.is_char_boundary(start) {
        start += 1;
    }
    format!("...[truncated]\n{}", &output[start..])
}

/// Run the suite once against unmodified sources. Returns how long it took.
pub fn run_baseline(
    command: &TestCommand,
    cwd: &Path,
    timeout: Option<Duration>,
    max_output_bytes: usize,
) -> Result<Duration, EngineError> {
    let result = command.run(cwd, timeout)?;
    if result.launch_failed() {
        return Err(EngineError::TestCommandLaunch {
            command: command.as_str().to_string(),
            reason: truncate_output(result.output.trim(), max_output_bytes),
        });
    }
    if result.timed_out {
        return Err(EngineError::BaselineFailed {
            output: format!(
                "test command did not finish within {:.1}s",
                timeout.map_or(0.0, |t| t.as_secs_f64())
            ),
        });
    }
    if !result.passed() {
        return Err(EngineError::BaselineFailed {
            output: truncate_output(&result.output, max_output_bytes),
        });
    }
    tracing::info!("Baseline passed in {:.2}s", result.duration.as_secs_f64());
    Ok(result.duration)
}
