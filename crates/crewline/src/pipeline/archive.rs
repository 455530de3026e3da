//! Task file handling: read the request, archive it after the run.
//!
//! After a run the task file moves to
//! `<archive_dir>/<YYYY-mm-dd_HH-MM-SS>_<topic>.txt` and a placeholder takes
//! its place so the next request can be typed in.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::error::CrewError;

/// Written to a missing task file so a first run has something to do.
pub const DEFAULT_REQUEST: &str = "Print 'Hello, World!' to console.";

/// Left in the task file after archiving.
pub const NEXT_TASK_PLACEHOLDER: &str = "Enter next task...";

/// Characters of the request used in the archive file name.
pub const TOPIC_CHARS: usize = 30;

/// Read the task file, creating it with [`DEFAULT_REQUEST`] first if it is
/// missing.
pub fn ensure_task_file(path: &Path) -> Result<String, CrewError> {
    let task_err = |source| CrewError::TaskFile {
        path: path.to_path_buf(),
        source,
    };
    if !path.exists() {
        info!("No task file at {}; writing a default request", path.display());
        std::fs::write(path, DEFAULT_REQUEST).map_err(task_err)?;
    }
    std::fs::read_to_string(path).map_err(task_err)
}

/// First [`TOPIC_CHARS`] characters of `request`, with every character that
/// is not an ASCII letter or digit replaced by `_`.
pub fn sanitize_topic(request: &str) -> String {
    request
        .chars()
        .take(TOPIC_CHARS)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Move `task_file` into `archive_dir` under a timestamped name derived from
/// `request`, then leave [`NEXT_TASK_PLACEHOLDER`] in its place.
pub fn archive_request(
    task_file: &Path,
    archive_dir: &Path,
    request: &str,
    now: DateTime<Local>,
) -> Result<PathBuf, CrewError> {
    let archive_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| CrewError::Archive { path, source }
    };

    std::fs::create_dir_all(archive_dir).map_err(archive_err(archive_dir))?;

    let name = format!(
        "{}_{}.txt",
        now.format("%Y-%m-%d_%H-%M-%S"),
        sanitize_topic(request)
    );
    let dest = archive_dir.join(name);

    // rename fails across filesystems; fall back to copy + remove.
    if std::fs::rename(task_file, &dest).is_err() {
        std::fs::copy(task_file, &dest).map_err(archive_err(task_file))?;
        std::fs::remove_file(task_file).map_err(archive_err(task_file))?;
    }
    std::fs::write(task_file, NEXT_TASK_PLACEHOLDER).map_err(archive_err(task_file))?;

    info!("Archived request to {}", dest.display());
    Ok(dest)
}
