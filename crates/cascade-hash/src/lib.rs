//! Generic content-hashing helpers.
//!
//! Two hash families are used deliberately for two different purposes:
//! - `sha1` for individual file contents, so an untracked file's hash is visually
//!   indistinguishable from a tracked file's git blob hash (both are hex sha1 digests).
//! - `sha2-256` for composing several already-hashed parts (command string, file-hash map,
//!   version tags) into one fingerprint, where collision resistance across heterogeneous
//!   inputs matters more than matching git's own hash family.

use std::{
    fs::File,
    io::{self, Read},
    path::Path,
};

use sha1::{Digest as _, Sha1};
use sha2::Sha256;

/// Streams a file's contents through sha1 and returns its hex digest, without loading the
/// whole file into memory.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn hash_bytes_sha1(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Accumulates a sequence of already-distinct parts into one composite digest.
///
/// Each part is length-prefixed before being folded in, so that `compose(["ab", "c"])` and
/// `compose(["a", "bc"])` never collide by concatenation alone.
#[derive(Default)]
pub struct CompositeHasher {
    hasher: Option<Sha256>,
}

impl CompositeHasher {
    pub fn new() -> Self {
        Self { hasher: Some(Sha256::new()) }
    }

    pub fn feed(&mut self, part: &str) -> &mut Self {
        let hasher = self.hasher.get_or_insert_with(Sha256::new);
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
        self
    }

    pub fn finish(self) -> String {
        let hasher = self.hasher.unwrap_or_else(Sha256::new);
        hex::encode(hasher.finalize())
    }
}

/// Convenience wrapper for the common case of hashing an ordered list of parts.
pub fn compose(parts: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    let mut hasher = CompositeHasher::new();
    for part in parts {
        hasher.feed(part.as_ref());
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn hash_file_is_deterministic() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        let a = hash_file(file.path()).unwrap();
        let b = hash_file(file.path()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, hash_bytes_sha1(b"hello world"));
    }

    #[test]
    fn compose_is_sensitive_to_part_boundaries() {
        let a = compose(["ab", "c"]);
        let b = compose(["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn compose_is_sensitive_to_order() {
        let a = compose(["a", "b"]);
        let b = compose(["b", "a"]);
        assert_ne!(a, b);
    }
}
