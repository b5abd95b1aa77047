//! Computes a task's [`CacheFingerprint`] from its command string, file-hash map, the
//! scheduler's tool-version tag, and a project-configuration tag.

use cascade_hash::CompositeHasher;
use cascade_types::cache::CacheFingerprint;
use cascade_types::scm::FileHashMap;

/// Folds the pieces that determine output interchangeability into one fingerprint. Equal
/// fingerprints across two runs imply the stored artifact can be restored instead of rerunning
/// the command.
pub fn fingerprint(
    command: &str,
    file_hashes: &FileHashMap,
    tool_version_tag: &str,
    config_tag: &str,
) -> CacheFingerprint {
    let mut hasher = CompositeHasher::new();
    hasher.feed(command);
    hasher.feed(tool_version_tag);
    hasher.feed(config_tag);
    for (path, hash) in file_hashes.iter() {
        hasher.feed(path);
        hasher.feed(hash);
    }
    CacheFingerprint::new(hasher.finish())
}
