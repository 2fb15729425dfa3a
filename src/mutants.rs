use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::parser::{NodeEdit, Span};

/// A source file loaded once per run. `path` is relative to the project root.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub original: String,
}

impl SourceFile {
    pub fn load(project_root: &Path, relative: &Path) -> std::io::Result<Self> {
        let original = std::fs::read_to_string(project_root.join(relative))?;
        Ok(Self {
            path: relative.to_path_buf(),
            original,
        })
    }
}

/// One mutation of one node, produced by the enumerator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationCandidate {
    /// Position in enumeration order across the whole run.
    pub index: usize,
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    /// Bytes replaced in the file.
    pub span: Span,
    pub replacement: String,
    /// Text of the whole node before and after mutation.
    pub original_node: String,
    pub mutated_node: String,
    pub rule: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

impl MutationCandidate {
    pub fn edit(&self) -> NodeEdit {
        NodeEdit {
            span: self.span,
            replacement: self.replacement.clone(),
        }
    }

    pub fn location(&self) -> String {
        format!("{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    Killed,
    Survived,
    TimedOut,
    Errored,
}

impl std::fmt::Display for MutationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Killed => write!(f, "killed"),
            Self::Survived => write!(f, "survived"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutantResult {
    pub candidate: MutationCandidate,
    pub outcome: MutationOutcome,
    pub diagnostic: Diagnostic,
    pub diff: String,
}

/// A file that was skipped during enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileError {
    pub file: PathBuf,
    pub code: String,
    pub message: String,
}

impl FileError {
    pub fn new(file: &Path, err: &crate::error::EngineError) -> Self {
        Self {
            file: file.to_path_buf(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}
