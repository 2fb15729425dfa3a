//! Mutation testing for Python projects.
//!
//! Rules from the [`operators`] registry rewrite single nodes of each source
//! file; every resulting mutant is written to disk, the project's test
//! command is run against it, and the original bytes are put back before the
//! next mutant. The [`report::Report`] says which mutants the suite caught.

pub mod config;
pub mod copy_tree;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod executor;
pub mod mutants;
pub mod operators;
pub mod output;
pub mod parser;
pub mod report;
pub mod runner;
pub mod safety;
pub mod scheduler;
pub mod state;

pub use config::Settings;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use mutants::{MutantResult, MutationCandidate, MutationOutcome, SourceFile};
pub use report::{Report, ScorePolicy, Summary};
