//! Tar+zstd archive creation and restoration for cache entries.
//!
//! Archives hold plain files and directories only; symlink restoration is not supported so a
//! cache entry can never smuggle a link that escapes the restore root.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::Path,
};

use cascade_paths::AbsoluteSystemPathBuf;

use crate::CacheError;

/// Writes every path under `project_root` matched by `files` into a new tar+zstd archive at
/// `archive_path`. `files` are absolute paths already filtered down to the task's output globs.
pub fn create(
    archive_path: &Path,
    project_root: &AbsoluteSystemPathBuf,
    files: &[AbsoluteSystemPathBuf],
) -> Result<(), CacheError> {
    let file = File::create(archive_path).map_err(|e| CacheError::Io(e.to_string()))?;
    let encoder = zstd::Encoder::new(BufWriter::new(file), 0).map_err(|e| CacheError::Io(e.to_string()))?;
    let mut builder = tar::Builder::new(encoder);

    let mut entries: Vec<&AbsoluteSystemPathBuf> = files.iter().collect();
    entries.sort();

    for path in entries {
        let relative = path
            .relative_to(project_root)
            .ok_or_else(|| CacheError::Corrupt(format!("{path} escapes {project_root}")))?;
        let metadata = fs::symlink_metadata(path.as_path()).map_err(|e| CacheError::Io(e.to_string()))?;
        if metadata.is_dir() {
            builder
                .append_dir(relative.as_str(), path.as_path())
                .map_err(|e| CacheError::Io(e.to_string()))?;
        } else if metadata.is_file() {
            let mut f = File::open(path.as_path()).map_err(|e| CacheError::Io(e.to_string()))?;
            builder
                .append_file(relative.as_str(), &mut f)
                .map_err(|e| CacheError::Io(e.to_string()))?;
        }
        // Symlinks are silently skipped: restoring them is out of scope for this cache.
    }

    let encoder = builder.into_inner().map_err(|e| CacheError::Io(e.to_string()))?;
    let _ = encoder.finish().map_err(|e| CacheError::Io(e.to_string()))?;
    Ok(())
}

/// Unpacks `archive_path` under `restore_root`, rejecting entries that would escape it.
pub fn restore(archive_path: &Path, restore_root: &AbsoluteSystemPathBuf) -> Result<(), CacheError> {
    let file = File::open(archive_path).map_err(|e| CacheError::Io(e.to_string()))?;
    let decoder = zstd::Decoder::new(BufReader::new(file)).map_err(|e| CacheError::Io(e.to_string()))?;
    let mut archive = tar::Archive::new(decoder);

    for entry in archive.entries().map_err(|e| CacheError::Corrupt(e.to_string()))? {
        let mut entry = entry.map_err(|e| CacheError::Corrupt(e.to_string()))?;
        let relative = entry.path().map_err(|e| CacheError::Corrupt(e.to_string()))?.into_owned();
        if relative.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            return Err(CacheError::Corrupt(format!("archive entry escapes restore root: {}", relative.display())));
        }
        let dest = restore_root.join(&relative);
        if let Some(parent) = dest.as_path().parent() {
            fs::create_dir_all(parent).map_err(|e| CacheError::Io(e.to_string()))?;
        }
        entry.unpack(dest.as_path()).map_err(|e| CacheError::Io(e.to_string()))?;
    }
    Ok(())
}
