use std::path::{Path, PathBuf};

use crate::report::Summary;

pub const STATE_FILE: &str = ".radiation-state.json";

pub fn state_path(project_root: &Path) -> PathBuf {
    project_root.join(STATE_FILE)
}

pub fn save_last_run(summary: &Summary, project_root: &Path) -> std::io::Result<()> {
    save_to_path(summary, &state_path(project_root))
}

pub fn load_last_run(project_root: &Path) -> Option<Summary> {
    load_from_path(&state_path(project_root))
}

pub fn save_to_path(summary: &Summary, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(summary).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

pub fn load_from_path(path: &Path) -> Option<Summary> {
    let data = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}
