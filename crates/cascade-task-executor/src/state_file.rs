//! The per-project state file: a JSON record of the file-hash map and command string that
//! produced the last successful (or skipped) run, used to detect "nothing changed" incrementally.

use std::fs;
use std::io;

use cascade_paths::AbsoluteSystemPathBuf;
use cascade_types::scm::FileHashMap;
use serde::{Deserialize, Serialize};

/// Directory name for scheduler-owned per-project state, created alongside the project's files.
pub const STATE_DIR_NAME: &str = ".cascade";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateFile {
    pub files: FileHashMap,
    pub arguments: String,
}

fn state_path(project_root: &AbsoluteSystemPathBuf, command_name: &str) -> std::path::PathBuf {
    project_root
        .join(STATE_DIR_NAME)
        .join(format!("package-deps.{command_name}.json"))
        .as_path()
        .to_path_buf()
}

/// Reads the prior state file, if any. Absence (or a corrupt file) means "never built" rather
/// than an error — a stale or missing state file should never fail a run, only cost it a skip.
pub fn read(project_root: &AbsoluteSystemPathBuf, command_name: &str) -> Option<StateFile> {
    let path = state_path(project_root, command_name);
    let contents = fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Writes the state file atomically (write-to-temp-then-rename) so a reader never observes a
/// half-written file.
pub fn write(
    project_root: &AbsoluteSystemPathBuf,
    command_name: &str,
    state: &StateFile,
) -> io::Result<()> {
    let path = state_path(project_root, command_name);
    let dir = path.parent().expect("state path always has a parent");
    fs::create_dir_all(dir)?;

    let tmp_path = dir.join(format!(".package-deps.{command_name}.{}.tmp", std::process::id()));
    let json = serde_json::to_string_pretty(state)?;
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// Deletes the state file, if present, so an interrupted rebuild never leaves stale "success"
/// state behind.
pub fn remove(project_root: &AbsoluteSystemPathBuf, command_name: &str) {
    let path = state_path(project_root, command_name);
    let _ = fs::remove_file(path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let root = AbsoluteSystemPathBuf::new(dir.path().canonicalize().unwrap()).unwrap();

        let mut files = FileHashMap::new();
        files.insert("src/lib.rs", "deadbeef");
        let state = StateFile { files, arguments: "cargo build".to_string() };

        write(&root, "build", &state).unwrap();
        let read_back = read(&root, "build").unwrap();
        assert_eq!(read_back, state);
    }

    #[test]
    fn missing_state_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let root = AbsoluteSystemPathBuf::new(dir.path().canonicalize().unwrap()).unwrap();
        assert!(read(&root, "build").is_none());
    }

    #[test]
    fn remove_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = AbsoluteSystemPathBuf::new(dir.path().canonicalize().unwrap()).unwrap();
        let state = StateFile { files: FileHashMap::new(), arguments: "echo hi".to_string() };
        write(&root, "build", &state).unwrap();
        remove(&root, "build");
        assert!(read(&root, "build").is_none());
    }
}
