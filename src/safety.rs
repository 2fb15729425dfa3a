//! On-disk snapshots of files under mutation.
//!
//! Before a mutant is written, the original bytes are saved next to the file.
//! The snapshot is deleted once the original has been restored, so a leftover
//! snapshot means a previous run died mid-transaction.

use std::path::{Path, PathBuf};

pub fn backup_path(source_file: &Path) -> PathBuf {
    let mut backup = source_file.to_path_buf();
    let name = format!(
        ".{}.radiation.bak",
        source_file.file_name().unwrap_or_default().to_string_lossy()
    );
    backup.set_file_name(name);
    backup
}

pub fn write_backup(source_file: &Path, original: &[u8]) -> std::io::Result<PathBuf> {
    let bak = backup_path(source_file);
    std::fs::write(&bak, original)?;
    Ok(bak)
}

/// Check if a backup file exists from a previous interrupted run.
pub fn check_interrupted_run(source_file: &Path) -> Option<PathBuf> {
    let bak = backup_path(source_file);
    if bak.exists() { Some(bak) } else { None }
}

/// Restore source from backup file and remove the backup.
pub fn restore_from_backup(source_file: &Path, backup_file: &Path) -> std::io::Result<()> {
    std::fs::copy(backup_file, source_file)?;
    std::fs::remove_file(backup_file)?;
    clear_pycache(source_file);
    Ok(())
}

/// Restore every file under `root` that still has a snapshot. Returns the
/// project-relative paths that were recovered.
pub fn recover_interrupted(root: &Path, files: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut recovered = Vec::new();
    for relative in files {
        let path = root.join(relative);
        if let Some(bak) = check_interrupted_run(&path) {
            restore_from_backup(&path, &bak)?;
            tracing::warn!(
                "Recovered {} from a previously interrupted run",
                relative.display()
            );
            recovered.push(relative.clone());
        }
    }
    Ok(recovered)
}

/// Remove the __pycache__ .pyc files for a given source file.
/// This forces Python to re-read the .py file on next import.
pub fn clear_pycache(source_file: &Path) {
    let (Some(parent), Some(stem)) = (source_file.parent(), source_file.file_stem()) else {
        return;
    };
    let cache_dir = parent.join("__pycache__");
    let Ok(entries) = std::fs::read_dir(&cache_dir) else {
        return;
    };
    let prefix = format!("{}.", stem.to_string_lossy());
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.starts_with(&prefix) && name_str.ends_with(".pyc") {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}
