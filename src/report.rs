//! Aggregation of mutant outcomes into a score and per-rule breakdown.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::mutants::{FileError, MutantResult, MutationOutcome};

/// How `TimedOut` and `Errored` outcomes enter the mutation score.
///
/// - `exclude-unscored`: score = killed / (killed + survived). Timeouts and
///   errors are reported but neither credit nor penalize the suite.
/// - `timeouts-as-killed`: a timeout counts as a kill (the suite noticed
///   something); errors stay out of the denominator.
/// - `strict`: score = killed / all outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScorePolicy {
    #[default]
    ExcludeUnscored,
    TimeoutsAsKilled,
    Strict,
}

impl ScorePolicy {
    pub const NAMES: &'static [&'static str] = &["exclude-unscored", "timeouts-as-killed", "strict"];

    /// `None` when nothing counts toward the denominator.
    pub fn score(self, counts: &Counts) -> Option<f64> {
        let (numerator, denominator) = match self {
            Self::ExcludeUnscored => (counts.killed, counts.killed + counts.survived),
            Self::TimeoutsAsKilled => (
                counts.killed + counts.timed_out,
                counts.killed + counts.survived + counts.timed_out,
            ),
            Self::Strict => (counts.killed, counts.total),
        };
        (denominator > 0).then(|| numerator as f64 / denominator as f64)
    }
}

impl std::fmt::Display for ScorePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ExcludeUnscored => "exclude-unscored",
            Self::TimeoutsAsKilled => "timeouts-as-killed",
            Self::Strict => "strict",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ScorePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exclude-unscored" => Ok(Self::ExcludeUnscored),
            "timeouts-as-killed" => Ok(Self::TimeoutsAsKilled),
            "strict" => Ok(Self::Strict),
            other => Err(format!(
                "Unknown score policy '{}'. Expected one of: {}",
                other,
                Self::NAMES.join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub total: usize,
    pub killed: usize,
    pub survived: usize,
    pub timed_out: usize,
    pub errored: usize,
}

impl Counts {
    pub fn record(&mut self, outcome: MutationOutcome) {
        self.total += 1;
        match outcome {
            MutationOutcome::Killed => self.killed += 1,
            MutationOutcome::Survived => self.survived += 1,
            MutationOutcome::TimedOut => self.timed_out += 1,
            MutationOutcome::Errored => self.errored += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Aborted,
}

/// Outcomes of a run in enumeration order.
#[derive(Debug, Clone)]
pub struct Report {
    results: Vec<MutantResult>,
    file_errors: Vec<FileError>,
    status: RunStatus,
    policy: ScorePolicy,
    duration: Duration,
}

impl Report {
    /// Results may arrive in any order; they are kept sorted by candidate index.
    pub fn new(
        mut results: Vec<MutantResult>,
        file_errors: Vec<FileError>,
        status: RunStatus,
        policy: ScorePolicy,
        duration: Duration,
    ) -> Self {
        results.sort_by_key(|r| r.candidate.index);
        Self {
            results,
            file_errors,
            status,
            policy,
            duration,
        }
    }

    pub fn results(&self) -> &[MutantResult] {
        &self.results
    }

    pub fn file_errors(&self) -> &[FileError] {
        &self.file_errors
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn policy(&self) -> ScorePolicy {
        self.policy
    }

    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for r in &self.results {
            counts.record(r.outcome);
        }
        counts
    }

    pub fn score(&self) -> Option<f64> {
        self.policy.score(&self.counts())
    }

    pub fn survivors(&self) -> impl Iterator<Item = &MutantResult> {
        self.results
            .iter()
            .filter(|r| r.outcome == MutationOutcome::Survived)
    }

    /// Survivors grouped by the rule that produced them.
    pub fn survivors_by_rule(&self) -> BTreeMap<&str, Vec<&MutantResult>> {
        let mut groups: BTreeMap<&str, Vec<&MutantResult>> = BTreeMap::new();
        for r in self.survivors() {
            groups.entry(r.candidate.rule.as_str()).or_default().push(r);
        }
        groups
    }

    pub fn per_rule(&self) -> BTreeMap<String, Counts> {
        let mut rules: BTreeMap<String, Counts> = BTreeMap::new();
        for r in &self.results {
            rules
                .entry(r.candidate.rule.clone())
                .or_default()
                .record(r.outcome);
        }
        rules
    }

    pub fn summary(&self) -> Summary {
        let survivors: Vec<SurvivedMutant> = self
            .survivors()
            .enumerate()
            .map(|(i, r)| SurvivedMutant::new(format!("m{}", i + 1), r))
            .collect();

        let rules = self
            .per_rule()
            .into_iter()
            .map(|(name, counts)| {
                let refs = survivors
                    .iter()
                    .filter(|s| s.rule == name)
                    .map(|s| s.ref_id.clone())
                    .collect();
                let breakdown = RuleBreakdown {
                    score: self.policy.score(&counts),
                    counts,
                    survivors: refs,
                };
                (name, breakdown)
            })
            .collect();

        Summary {
            status: self.status,
            policy: self.policy,
            score: self.score(),
            counts: self.counts(),
            duration_ms: self.duration.as_millis() as u64,
            rules,
            survived_mutants: survivors,
            file_errors: self.file_errors.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleBreakdown {
    #[serde(flatten)]
    pub counts: Counts,
    pub score: Option<f64>,
    /// Ref ids of this rule's survivors.
    pub survivors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivedMutant {
    pub ref_id: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub rule: String,
    pub original: String,
    pub replacement: String,
    pub diff: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

impl SurvivedMutant {
    fn new(ref_id: String, r: &MutantResult) -> Self {
        let c = &r.candidate;
        Self {
            ref_id,
            file: c.file.display().to_string(),
            line: c.line,
            column: c.column,
            rule: c.rule.clone(),
            original: c.original_node.clone(),
            replacement: c.mutated_node.clone(),
            diff: r.diff.clone(),
            context_before: c.context_before.clone(),
            context_after: c.context_after.clone(),
        }
    }
}

/// Structured run summary handed to presentation and persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub status: RunStatus,
    pub policy: ScorePolicy,
    pub score: Option<f64>,
    #[serde(flatten)]
    pub counts: Counts,
    pub duration_ms: u64,
    pub rules: BTreeMap<String, RuleBreakdown>,
    pub survived_mutants: Vec<SurvivedMutant>,
    pub file_errors: Vec<FileError>,
}

impl Summary {
    pub fn find_survivor(&self, ref_id: &str) -> Option<&SurvivedMutant> {
        let ref_id = ref_id.trim_start_matches('@');
        self.survived_mutants.iter().find(|m| m.ref_id == ref_id)
    }
}
