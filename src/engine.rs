use std::time::Instant;

use crate::config::Settings;
use crate::copy_tree::Workspace;
use crate::discovery::{self, PathFilter, Plan};
use crate::error::{EngineError, Result};
use crate::executor::Executor;
use crate::operators::Registry;
use crate::report::Report;
use crate::runner::{self, TestCommand};
use crate::safety;
use crate::scheduler::{Scheduler, StopSignal};

/// Settings in, report out.
pub struct Engine {
    settings: Settings,
    registry: Registry,
    stop: StopSignal,
}

impl Engine {
    /// Validates `settings`; nothing is touched on disk yet.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let registry = settings.registry()?;
        Ok(Self {
            settings,
            registry,
            stop: StopSignal::new(),
        })
    }

    /// Replace the registry, e.g. to add custom rules.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Flag that ends the run after in-flight mutants are restored.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn filter(&self) -> PathFilter {
        PathFilter {
            include: self.settings.include.clone(),
            exclude: self.settings.exclude.clone(),
            tests_dir: Some(self.settings.tests_dir.clone()),
        }
    }

    /// Enumerate candidates without running anything.
    pub fn plan(&self) -> Plan {
        discovery::enumerate(&self.settings.project_root, &self.filter(), &self.registry)
    }

    fn executor(&self) -> Executor {
        let command = TestCommand::resolve(&self.settings.run_command, &self.settings.project_root);
        Executor::new(command, self.settings.timeout(), self.settings.max_output_bytes)
    }

    fn run_baseline(&self, executor: &Executor) -> Result<()> {
        let root = &self.settings.project_root;
        let workspace = if self.settings.in_place {
            Workspace::in_place(root)
        } else {
            Workspace::isolated(root, "baseline").map_err(|e| EngineError::Workspace {
                reason: format!("copying {}: {}", root.display(), e),
            })?
        };
        runner::run_baseline(
            executor.command(),
            workspace.root(),
            executor.timeout(),
            self.settings.max_output_bytes,
        )?;
        Ok(())
    }

    /// Recover, enumerate, check the baseline, then mutate.
    pub fn run(&self) -> Result<Report> {
        let start = Instant::now();
        let root = &self.settings.project_root;

        let sources = discovery::collect_sources(root, &self.filter());
        safety::recover_interrupted(root, &sources).map_err(|e| EngineError::io(root, e))?;

        let plan = self.plan();
        tracing::info!(
            "Enumerated {} mutant(s) in {} file(s) ({} skipped) with rules: {}",
            plan.candidate_count(),
            plan.files.len(),
            plan.file_errors.len(),
            self.registry.names().join(", ")
        );

        let executor = self.executor();
        if self.settings.baseline && plan.candidate_count() > 0 {
            self.run_baseline(&executor)?;
        }

        let scheduler = Scheduler::new(executor, root, self.settings.worker_count())
            .in_place(self.settings.in_place)
            .with_stop_signal(self.stop.clone());
        let output = scheduler.run(&plan)?;

        Ok(Report::new(
            output.results,
            plan.file_errors,
            output.status,
            self.settings.score_policy,
            start.elapsed(),
        ))
    }
}
