//! SHA-256 content addressing of image build contexts.
//!
//! An image's fingerprint covers every file in its build context (relative
//! path and contents, in sorted order) plus the fingerprints of the images it
//! depends on, so that a change anywhere below an image changes its tag.

use std::path::Path;

use mzcompose_common::error::{ComposeError, Result};
use sha2::{Digest, Sha256};

/// Directory names never included in a fingerprint.
const IGNORED_DIRS: [&str; 2] = [".git", "target"];

/// Computes the fingerprint of a build context and its dependencies.
///
/// `dependencies` are `(name, fingerprint)` pairs; their order does not
/// matter.
///
/// # Errors
///
/// Returns an error if the context cannot be walked or a file cannot be read.
pub fn fingerprint(context: &Path, dependencies: &[(String, String)]) -> Result<String> {
    tracing::debug!(context = %context.display(), "fingerprinting build context");
    let mut hasher = Sha256::new();

    let mut files = Vec::new();
    let walker = walkdir::WalkDir::new(context)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !(e.file_type().is_dir()
                    && IGNORED_DIRS
                        .iter()
                        .any(|d| e.file_name().to_string_lossy() == *d))
        });
    for entry in walker {
        let entry = entry.map_err(|e| ComposeError::Io {
            path: e.path().unwrap_or(context).to_path_buf(),
            source: e.into(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    for path in &files {
        let relative = path.strip_prefix(context).unwrap_or(path);
        let contents = std::fs::read(path).map_err(|e| ComposeError::io(path, e))?;
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update((contents.len() as u64).to_le_bytes());
        hasher.update(&contents);
    }

    let mut deps: Vec<&(String, String)> = dependencies.iter().collect();
    deps.sort();
    for (name, fp) in deps {
        hasher.update(b"dep:");
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(fp.as_bytes());
    }

    Ok(format!("{:x}", hasher.finalize()))
}
