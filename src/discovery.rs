//! Mutation enumeration.
//!
//! Source selection happens first: include entries pick files, exclude
//! patterns and the tests directory drop them, so filtered paths are never
//! parsed. Each surviving file is parsed and walked pre-order, left to right,
//! asking every registered rule about every node. The resulting candidate
//! sequence depends only on file contents and the rule set.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::copy_tree;
use crate::error::EngineError;
use crate::mutants::{FileError, MutationCandidate, SourceFile};
use crate::operators::Registry;
use crate::parser;

#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub tests_dir: Option<String>,
}

/// Candidates for one file, in enumeration order.
#[derive(Debug, Clone)]
pub struct FilePlan {
    pub source: Arc<SourceFile>,
    pub candidates: Vec<MutationCandidate>,
}

#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub files: Vec<FilePlan>,
    pub file_errors: Vec<FileError>,
}

impl Plan {
    pub fn candidate_count(&self) -> usize {
        self.files.iter().map(|f| f.candidates.len()).sum()
    }

    pub fn candidates(&self) -> impl Iterator<Item = &MutationCandidate> {
        self.files.iter().flat_map(|f| f.candidates.iter())
    }
}

fn normalize(entry: &str) -> &str {
    let entry = entry.trim();
    let entry = entry.strip_prefix("./").unwrap_or(entry);
    entry.trim_end_matches('/')
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether `relative` is selected by an include/exclude entry. Entries naming an
/// existing file or directory under `root` match by path prefix, anything else
/// is a glob over the slash-separated relative path.
fn entry_matches(root: &Path, entry: &str, relative: &Path) -> bool {
    let entry = normalize(entry);
    if entry.is_empty() || entry == "." {
        return true;
    }
    let on_disk = root.join(entry);
    if on_disk.is_dir() || on_disk.is_file() {
        return relative.starts_with(entry);
    }
    glob_match::glob_match(entry, &to_slash(relative))
}

impl PathFilter {
    pub fn accepts(&self, root: &Path, relative: &Path) -> bool {
        if let Some(tests) = &self.tests_dir {
            let tests = normalize(tests);
            if !tests.is_empty() && tests != "." && relative.starts_with(tests) {
                return false;
            }
        }
        if self.exclude.iter().any(|e| entry_matches(root, e, relative)) {
            return false;
        }
        self.include.iter().any(|e| entry_matches(root, e, relative))
    }
}

/// Python files under `root` accepted by `filter`, relative and sorted.
pub fn collect_sources(root: &Path, filter: &PathFilter) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let walker = walkdir::WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !copy_tree::should_skip(&e.file_name().to_string_lossy()));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Skipping unreadable path during discovery: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("py") {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if filter.accepts(root, relative) {
            files.push(relative.to_path_buf());
        }
    }
    files.sort();
    files
}

fn get_context(lines: &[&str], line_idx: usize, range: usize) -> (Vec<String>, Vec<String>) {
    let line_idx = line_idx.min(lines.len());
    let start = line_idx.saturating_sub(range);
    let end = (line_idx + range + 1).min(lines.len());
    let before: Vec<String> = lines[start..line_idx].iter().map(|s| s.to_string()).collect();
    let after: Vec<String> = if line_idx + 1 < end {
        lines[line_idx + 1..end].iter().map(|s| s.to_string()).collect()
    } else {
        vec![]
    };
    (before, after)
}

/// Enumerate the candidates of one file. Indexes start at `first_index`.
pub fn discover_mutations(
    source: &SourceFile,
    registry: &Registry,
    first_index: usize,
) -> Result<Vec<MutationCandidate>, EngineError> {
    let tree = parser::parse(&source.original).map_err(|reason| EngineError::UnparsedFile {
        file: source.path.clone(),
        reason,
    })?;
    let lines: Vec<&str> = source.original.lines().collect();
    let mut candidates = Vec::new();

    for node in tree.root().preorder() {
        for (rule, edit) in registry.mutate(node) {
            let (line, column) = line_col(&source.original, edit.span.start_byte);
            let (context_before, context_after) = get_context(&lines, line - 1, 2);
            candidates.push(MutationCandidate {
                index: first_index + candidates.len(),
                file: source.path.clone(),
                line,
                column,
                span: edit.span,
                original_node: node.text().to_string(),
                mutated_node: node.text_with(&edit),
                replacement: edit.replacement,
                rule: rule.to_string(),
                context_before,
                context_after,
            });
        }
    }
    Ok(candidates)
}

/// 1-indexed line and column of a byte offset.
fn line_col(source: &str, byte: usize) -> (usize, usize) {
    let before = &source[..byte];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(byte, |nl| byte - nl - 1) + 1;
    (line, column)
}

/// Load, filter and enumerate every source file of the project.
///
/// Files that cannot be read or parsed are recorded in [`Plan::file_errors`]
/// and skipped.
pub fn enumerate(root: &Path, filter: &PathFilter, registry: &Registry) -> Plan {
    let mut plan = Plan::default();
    let mut next_index = 0;

    for relative in collect_sources(root, filter) {
        let source = match SourceFile::load(root, &relative) {
            Ok(s) => s,
            Err(e) => {
                let err = EngineError::io(root.join(&relative), e);
                tracing::warn!("{}", err);
                plan.file_errors.push(FileError::new(&relative, &err));
                continue;
            }
        };
        match discover_mutations(&source, registry, next_index) {
            Ok(candidates) => {
                tracing::debug!(
                    "{}: {} candidate(s)",
                    relative.display(),
                    candidates.len()
                );
                next_index += candidates.len();
                plan.files.push(FilePlan {
                    source: Arc::new(source),
                    candidates,
                });
            }
            Err(err) => {
                tracing::warn!("Skipping {}: {}", relative.display(), err);
                plan.file_errors.push(FileError::new(&relative, &err));
            }
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_is_one_indexed() {
        let src = "x = 1\ny = a + b\n";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 12), (2, 7));
    }

    #[test]
    fn normalize_strips_dot_slash_and_trailing_slash() {
        assert_eq!(normalize("./src/"), "src");
        assert_eq!(normalize(" mydir/ "), "mydir");
        assert_eq!(normalize("."), ".");
    }

    #[test]
    fn get_context_clamps_at_file_edges() {
        let lines = vec!["a", "b", "c"];
        let (before, after) = get_context(&lines, 0, 2);
        assert!(before.is_empty());
        assert_eq!(after, vec!["b", "c"]);
        let (before, after) = get_context(&lines, 2, 2);
        assert_eq!(before, vec!["a", "b"]);
        assert!(after.is_empty());
    }
}
