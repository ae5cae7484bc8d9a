//! Hashing utilities.
//!
//! This module provides:
//! - `hash_bytes()`: full SHA-256 digest of arbitrary bytes
//! - `project_slug()`: the stable directory name used for per-project caches

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::consts::SLUG_HASH_LEN;

/// Hash arbitrary bytes.
///
/// Returns the full 64-character lowercase hexadecimal SHA-256 digest.
pub fn hash_bytes(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  hex::encode(hasher.finalize())
}

/// Compute the cache slug of a project directory.
///
/// The slug is the directory name with every character outside
/// `[A-Za-z0-9_.-]` replaced by `_`, followed by `-` and the first
/// 12 hex characters of the SHA-256 of the full path. Two projects with the
/// same directory name in different locations get distinct slugs.
///
/// # Example
///
/// ```ignore
/// let slug = project_slug(Path::new("/home/user/my project"));
/// assert!(slug.starts_with("my_project-"));
/// ```
pub fn project_slug(project: &Path) -> String {
  let name = project
    .file_name()
    .map(|n| n.to_string_lossy().to_string())
    .unwrap_or_else(|| "root".to_string());

  let sanitized: String = name
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
        c
      } else {
        '_'
      }
    })
    .collect();

  let digest = hash_bytes(project.to_string_lossy().as_bytes());
  format!("{}-{}", sanitized, &digest[..SLUG_HASH_LEN])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_bytes_is_full_sha256() {
    let hash = hash_bytes(b"hello world");
    assert_eq!(hash.len(), 64);
    assert_eq!(hash, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
  }

  #[test]
  fn slug_sanitizes_name() {
    let slug = project_slug(Path::new("/home/user/my project!"));
    assert!(slug.starts_with("my_project_-"), "unexpected slug {slug}");
    assert_eq!(slug.len(), "my_project_-".len() + SLUG_HASH_LEN);
  }

  #[test]
  fn slug_depends_on_full_path() {
    let a = project_slug(Path::new("/a/project"));
    let b = project_slug(Path::new("/b/project"));
    assert_ne!(a, b);
    assert!(a.starts_with("project-"));
    assert!(b.starts_with("project-"));
  }

  #[test]
  fn slug_is_stable() {
    let path = Path::new("/work/app");
    assert_eq!(project_slug(path), project_slug(path));
  }
}
