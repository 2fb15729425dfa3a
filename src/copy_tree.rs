use std::fs;
use std::path::{Path, PathBuf};

const SKIP_NAMES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    ".venv",
    "venv",
    "__pycache__",
    ".tox",
    ".nox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    ".eggs",
    "target",
    "dist",
    "build",
    ".radiation-state.json",
];

const SKIP_SUFFIXES: &[&str] = &[".radiation.bak", ".pyc", ".pyo", ".egg-info"];

/// Names never copied into a working copy nor considered for mutation.
pub fn should_skip(name: &str) -> bool {
    SKIP_NAMES.iter().any(|s| *s == name) || SKIP_SUFFIXES.iter().any(|s| name.ends_with(s))
}

fn copy_dir_filtered(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if should_skip(&name_str) {
            continue;
        }
        let src_path = entry.path();
        let dst_path = dst.join(&name);
        let ft = entry.file_type()?;
        if ft.is_dir() {
            copy_dir_filtered(&src_path, &dst_path)?;
        } else if ft.is_file() {
            fs::copy(&src_path, &dst_path)?;
        }
        // Skip symlinks and other special files
    }
    Ok(())
}

/// Find the project root by walking up from `start` looking for markers.
pub fn find_project_root(start: &Path) -> PathBuf {
    let markers = &[
        ".radiation.toml",
        ".radiation.cfg",
        "pyproject.toml",
        "setup.py",
        "setup.cfg",
        ".git",
    ];
    let mut dir = start;
    loop {
        for marker in markers {
            if dir.join(marker).exists() {
                return dir.to_path_buf();
            }
        }
        match dir.parent() {
            Some(parent) if parent != dir => dir = parent,
            _ => break,
        }
    }
    start.to_path_buf()
}

/// The project tree a worker mutates.
///
/// `Isolated` owns a temporary copy that is deleted when dropped. `InPlace`
/// points at the real project and is only used by a single worker.
pub enum Workspace {
    InPlace { root: PathBuf },
    Isolated { root: PathBuf, _temp_dir: tempfile::TempDir },
}

impl Workspace {
    pub fn in_place(project_root: &Path) -> Self {
        Self::InPlace {
            root: project_root.to_path_buf(),
        }
    }

    /// Copy `project_root` into a fresh temporary directory.
    pub fn isolated(project_root: &Path, session_id: &str) -> std::io::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix(&format!("radiation-{}-", session_id))
            .tempdir()?;
        let root = temp_dir.path().join("project");
        copy_dir_filtered(project_root, &root)?;
        tracing::debug!(
            "Copied {} to working copy {}",
            project_root.display(),
            root.display()
        );
        Ok(Self::Isolated {
            root,
            _temp_dir: temp_dir,
        })
    }

    pub fn root(&self) -> &Path {
        match self {
            Self::InPlace { root } | Self::Isolated { root, .. } => root,
        }
    }

    /// Path of a project-relative file inside this workspace.
    pub fn path_of(&self, relative: &Path) -> PathBuf {
        self.root().join(relative)
    }

    pub fn is_isolated(&self) -> bool {
        matches!(self, Self::Isolated { .. })
    }
}
