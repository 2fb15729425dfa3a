//! Worker pool that drives the executor across a plan.
//!
//! A file is the unit of dispatch: the worker that takes a file runs all of
//! its candidates one after another, so a file never holds two mutants at
//! once. Workers mutate private copies of the project, made on first use and
//! deleted when the worker exits. The stop signal is checked before each
//! candidate and never interrupts a running transaction.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, mpsc};

use crate::copy_tree::Workspace;
use crate::discovery::{FilePlan, Plan};
use crate::error::EngineError;
use crate::executor::Executor;
use crate::mutants::MutantResult;
use crate::report::RunStatus;

/// Cooperative cancellation flag shared between the caller and the workers.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// Results in arrival order plus how the run ended.
#[derive(Debug)]
pub struct RunOutput {
    pub results: Vec<MutantResult>,
    pub status: RunStatus,
}

pub struct Scheduler {
    executor: Executor,
    project_root: PathBuf,
    workers: usize,
    in_place: bool,
    session_id: String,
    stop: StopSignal,
    state: Mutex<RunState>,
}

fn generate_session_id() -> String {
    format!("{:08x}", fastrand::u32(..))
}

impl Scheduler {
    pub fn new(executor: Executor, project_root: &Path, workers: usize) -> Self {
        Self {
            executor,
            project_root: project_root.to_path_buf(),
            workers: workers.max(1),
            in_place: false,
            session_id: generate_session_id(),
            stop: StopSignal::new(),
            state: Mutex::new(RunState::Idle),
        }
    }

    /// Mutate the real project tree with a single worker instead of copies.
    pub fn in_place(mut self, in_place: bool) -> Self {
        self.in_place = in_place;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn state(&self) -> RunState {
        *self.lock_state()
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, state: RunState) {
        *self.lock_state() = state;
    }

    fn pool_size(&self, jobs: usize) -> usize {
        if self.in_place {
            1
        } else {
            self.workers.min(jobs).max(1)
        }
    }

    fn create_workspace(&self, worker: usize) -> Result<Workspace, EngineError> {
        if self.in_place {
            return Ok(Workspace::in_place(&self.project_root));
        }
        Workspace::isolated(
            &self.project_root,
            &format!("{}-w{}", self.session_id, worker),
        )
        .map_err(|e| EngineError::Workspace {
            reason: format!("copying {}: {}", self.project_root.display(), e),
        })
    }

    /// Execute every candidate in `plan`.
    ///
    /// Returns `Err` on the first fatal error, after every in-flight
    /// transaction has restored its file.
    pub fn run(&self, plan: &Plan) -> Result<RunOutput, EngineError> {
        self.set_state(RunState::Running);

        let jobs: Vec<&FilePlan> = plan
            .files
            .iter()
            .filter(|f| !f.candidates.is_empty())
            .collect();
        let pool = self.pool_size(jobs.len());
        tracing::info!(
            "Running {} mutant(s) across {} file(s) with {} worker(s)",
            plan.candidate_count(),
            jobs.len(),
            pool
        );

        let next_job = AtomicUsize::new(0);
        let fatal: Mutex<Option<EngineError>> = Mutex::new(None);
        let (tx, rx) = mpsc::channel::<MutantResult>();

        let results = std::thread::scope(|scope| {
            for worker in 0..pool {
                let tx = tx.clone();
                let jobs = &jobs;
                let next_job = &next_job;
                let fatal = &fatal;
                scope.spawn(move || self.work(worker, jobs, next_job, fatal, tx));
            }
            drop(tx);
            rx.iter().collect::<Vec<_>>()
        });

        let fatal = fatal.into_inner().unwrap_or_else(|p| p.into_inner());
        if let Some(err) = fatal {
            tracing::error!("Run aborted: {}", err);
            self.set_state(RunState::Aborted);
            return Err(err);
        }

        let status = if results.len() < plan.candidate_count() {
            tracing::info!(
                "Run stopped after {} of {} mutant(s)",
                results.len(),
                plan.candidate_count()
            );
            self.set_state(RunState::Aborted);
            RunStatus::Aborted
        } else {
            self.set_state(RunState::Completed);
            RunStatus::Completed
        };
        Ok(RunOutput { results, status })
    }

    fn work(
        &self,
        worker: usize,
        jobs: &[&FilePlan],
        next_job: &AtomicUsize,
        fatal: &Mutex<Option<EngineError>>,
        tx: mpsc::Sender<MutantResult>,
    ) {
        let mut workspace: Option<Workspace> = None;
        let fail = |err: EngineError| {
            self.stop.stop();
            let mut slot = fatal.lock().unwrap_or_else(|p| p.into_inner());
            if slot.is_none() {
                *slot = Some(err);
            }
        };

        'jobs: loop {
            if self.stop.is_stopped() {
                break;
            }
            let i = next_job.fetch_add(1, Ordering::SeqCst);
            let Some(job) = jobs.get(i) else {
                break;
            };

            if workspace.is_none() {
                match self.create_workspace(worker) {
                    Ok(ws) => workspace = Some(ws),
                    Err(e) => {
                        fail(e);
                        break;
                    }
                }
            }
            let Some(ws) = workspace.as_ref() else {
                break;
            };

            tracing::debug!(
                "worker {} took {} ({} mutant(s))",
                worker,
                job.source.path.display(),
                job.candidates.len()
            );
            for candidate in &job.candidates {
                if self.stop.is_stopped() {
                    break 'jobs;
                }
                match self.executor.execute(ws, &job.source, candidate) {
                    Ok(result) => {
                        if tx.send(result).is_err() {
                            break 'jobs;
                        }
                    }
                    Err(e) => {
                        fail(e);
                        break 'jobs;
                    }
                }
            }
        }
        // Dropping the workspace removes the worker's copy.
        drop(workspace);
    }
}
