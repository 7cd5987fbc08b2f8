//! Sequentially versioned output directories (`results_1`, `results_2`, ...).

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Returns `<base>/<prefix>_<n>` where `n` is one more than the largest index of any
/// existing `<prefix>_<integer>` subdirectory of `base` (1 if there is none).
///
/// `base` is created when missing. The returned directory itself is not created,
/// that is left to the caller. There is no locking: two concurrent callers can be
/// handed the same path.
///
/// # Examples
///
/// ```rust
/// use flowmc_toys::outdir::next_available_dir;
///
/// let base = std::env::temp_dir().join("flowmc_toys_outdir_doc");
/// # let _ = std::fs::remove_dir_all(&base);
/// let next = next_available_dir(&base, "results")?;
/// assert_eq!(next, base.join("results_1"));
/// # Ok::<(), flowmc_toys::Error>(())
/// ```
pub fn next_available_dir(base: impl AsRef<Path>, prefix: &str) -> Result<PathBuf> {
    let base = base.as_ref();
    if !base.exists() {
        fs::create_dir_all(base)?;
    }

    let mut highest = 0u64;
    for entry in fs::read_dir(base)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(index) = entry.file_name().to_str().and_then(|n| version_of(n, prefix)) {
            highest = highest.max(index);
        }
    }

    Ok(base.join(format!("{prefix}_{}", highest + 1)))
}

/// Parses the integer suffix of `name` if it is exactly `<prefix>_<digits>`.
fn version_of(name: &str, prefix: &str) -> Option<u64> {
    let digits = name.strip_prefix(prefix)?.strip_prefix('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_skips_to_after_highest_version() {
        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join("results_1")).unwrap();
        fs::create_dir(tmp.path().join("results_3")).unwrap();

        let next = next_available_dir(tmp.path(), "results").unwrap();
        assert_eq!(next, tmp.path().join("results_4"));
        assert!(!next.exists(), "Expected the versioned directory not to be created.");
    }

    #[test]
    fn test_missing_base_is_created() {
        let tmp = tempdir().unwrap();
        let base = tmp.path().join("nested").join("runs");

        let next = next_available_dir(&base, "results").unwrap();
        assert!(base.is_dir());
        assert_eq!(next, base.join("results_1"));
    }

    #[test]
    fn test_ignores_files_and_foreign_names() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("results_9"), b"not a directory").unwrap();
        fs::create_dir(tmp.path().join("results_x")).unwrap();
        fs::create_dir(tmp.path().join("results_2_old")).unwrap();
        fs::create_dir(tmp.path().join("other_5")).unwrap();
        fs::create_dir(tmp.path().join("results_2")).unwrap();

        let next = next_available_dir(tmp.path(), "results").unwrap();
        assert_eq!(next, tmp.path().join("results_3"));
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!(version_of("results_12", "results"), Some(12));
        assert_eq!(version_of("results_", "results"), None);
        assert_eq!(version_of("results12", "results"), None);
        assert_eq!(version_of("run_1", "results"), None);
        assert_eq!(version_of("run_007", "run"), Some(7));
    }
}
