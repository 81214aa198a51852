//! Size estimation for a cache entry that has not been saved yet
//!
//! The estimate is the on-disk size of the paths about to be cached, in whole
//! megabytes, plus a buffer for archive and compression overhead.

use crate::config::BYTES_PER_MB;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Buffer added on top of the measured size, in percent
pub const BUFFER_PERCENT: u64 = 25;

/// Breakdown of a size estimate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeEstimate {
    /// Measured size in megabytes, each path rounded up
    pub raw_mb: u64,
    /// Measured size plus buffer
    pub estimated_mb: u64,
    /// Paths that existed and were measured
    pub measured_paths: usize,
    /// Paths that did not exist
    pub missing_paths: usize,
}

impl SizeEstimate {
    /// Estimated size in bytes
    #[must_use]
    pub const fn estimated_bytes(&self) -> u64 {
        self.estimated_mb.saturating_mul(BYTES_PER_MB)
    }
}

/// Estimate the size of an entry built from `paths`.
///
/// Returns 0 only when none of the paths exist. Any existing path yields at
/// least 1 MB, so a non-empty path set is never reported as free.
#[must_use]
pub fn estimate<P: AsRef<Path>>(paths: &[P]) -> SizeEstimate {
    measure(paths, &BTreeSet::new())
}

/// Measure `paths`, pruning every subtree listed in `excluded`
fn measure<P: AsRef<Path>>(paths: &[P], excluded: &BTreeSet<PathBuf>) -> SizeEstimate {
    let mut result = SizeEstimate::default();

    for path in paths {
        let path = path.as_ref();
        if excluded.contains(path) {
            debug!(path = %path.display(), "Cache path excluded, skipping");
            continue;
        }
        if !path.exists() {
            debug!(path = %path.display(), "Cache path does not exist, skipping");
            result.missing_paths += 1;
            continue;
        }
        let bytes = disk_usage(path, excluded);
        let mb = bytes.div_ceil(BYTES_PER_MB);
        debug!(path = %path.display(), bytes, mb, "Measured cache path");
        result.raw_mb += mb;
        result.measured_paths += 1;
    }

    result.estimated_mb = result.raw_mb * (100 + BUFFER_PERCENT) / 100;
    if result.estimated_mb == 0 && result.measured_paths > 0 {
        result.estimated_mb = 1;
    }
    result
}

/// Estimate the size of an entry from cache `path` input lines.
///
/// One pattern per line; blank lines are ignored, a leading `~` expands to
/// the home directory, glob patterns are expanded, and lines starting with
/// `!` exclude matching paths. An excluded directory is pruned with its
/// whole subtree, including when it sits inside an included directory.
#[must_use]
pub fn estimate_patterns(input: &str) -> SizeEstimate {
    let patterns = resolve_patterns(input);
    measure(&patterns.included, &patterns.excluded)
}

/// Cache `path` input lines expanded into concrete paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPatterns {
    /// Paths to measure
    pub included: Vec<PathBuf>,
    /// Paths pruned from the measurement, with their subtrees
    pub excluded: BTreeSet<PathBuf>,
}

/// Expand cache `path` input lines into concrete paths
#[must_use]
pub fn resolve_patterns(input: &str) -> ResolvedPatterns {
    let mut included = BTreeSet::new();
    let mut excluded = BTreeSet::new();

    for line in input.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (pattern, target) = match line.strip_prefix('!') {
            Some(rest) => (rest.trim(), &mut excluded),
            None => (line, &mut included),
        };
        target.extend(expand(&expand_home(pattern)));
    }

    ResolvedPatterns {
        included: included.difference(&excluded).cloned().collect(),
        excluded,
    }
}

fn expand_home(pattern: &str) -> String {
    match (pattern.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            format!("{}{rest}", home.display())
        }
        _ => pattern.to_string(),
    }
}

fn expand(pattern: &str) -> Vec<PathBuf> {
    if !pattern.contains(['*', '?', '[']) {
        return vec![PathBuf::from(pattern)];
    }

    match glob::glob(pattern) {
        Ok(paths) => paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable glob match");
                    None
                }
            })
            .collect(),
        Err(e) => {
            warn!(pattern, error = %e, "Invalid cache path pattern");
            Vec::new()
        }
    }
}

/// Bytes used by a file or directory subtree; unreadable entries are skipped
fn disk_usage(path: &Path, excluded: &BTreeSet<PathBuf>) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !excluded.contains(entry.path()))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable path while measuring");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, size: usize) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(&vec![0u8; size]).unwrap();
        path
    }

    #[test]
    fn test_no_existing_paths_is_zero() {
        let result = estimate(&["/nonexistent/cache/path", "/also/missing"]);
        assert_eq!(result.estimated_mb, 0);
        assert_eq!(result.missing_paths, 2);
    }

    #[test]
    fn test_small_file_rounds_up_to_one() {
        let tmp = TempDir::new().unwrap();
        let file = create_test_file(tmp.path(), "small.bin", 10);

        let result = estimate(&[file]);
        assert_eq!(result.raw_mb, 1);
        // 1 * 1.25 floors to 1
        assert_eq!(result.estimated_mb, 1);
    }

    #[test]
    fn test_empty_existing_path_is_at_least_one() {
        let tmp = TempDir::new().unwrap();
        let result = estimate(&[tmp.path()]);
        assert_eq!(result.raw_mb, 0);
        assert_eq!(result.estimated_mb, 1);
    }

    #[test]
    fn test_buffer_applied_to_directory_tree() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("nested");
        fs::create_dir(&nested).unwrap();
        create_test_file(tmp.path(), "a.bin", 2 * BYTES_PER_MB as usize);
        create_test_file(&nested, "b.bin", 2 * BYTES_PER_MB as usize);

        let result = estimate(&[tmp.path()]);
        assert_eq!(result.raw_mb, 4);
        assert_eq!(result.estimated_mb, 5);
        assert_eq!(result.estimated_bytes(), 5 * BYTES_PER_MB);
    }

    #[test]
    fn test_missing_paths_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let file = create_test_file(tmp.path(), "data.bin", 4 * BYTES_PER_MB as usize);
        let missing = tmp.path().join("missing");

        let result = estimate(&[file, missing]);
        assert_eq!(result.measured_paths, 1);
        assert_eq!(result.missing_paths, 1);
        assert_eq!(result.estimated_mb, 5);
    }

    #[test]
    fn test_patterns_with_glob_and_exclusion() {
        let tmp = TempDir::new().unwrap();
        create_test_file(tmp.path(), "keep.bin", 100);
        create_test_file(tmp.path(), "drop.bin", 100);
        let root = tmp.path().display();

        let input = format!("\n{root}/*.bin\n!{root}/drop.bin\n\n");
        let patterns = resolve_patterns(&input);
        assert_eq!(patterns.included, vec![tmp.path().join("keep.bin")]);

        let result = estimate_patterns(&input);
        assert_eq!(result.measured_paths, 1);
        assert_eq!(result.estimated_mb, 1);
    }

    #[test]
    fn test_exclusion_prunes_subtree_of_included_directory() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("target");
        let debug = target.join("debug");
        fs::create_dir_all(debug.join("deps")).unwrap();
        create_test_file(&target, "release.bin", 2 * BYTES_PER_MB as usize);
        create_test_file(&debug, "app.bin", 8 * BYTES_PER_MB as usize);
        create_test_file(&debug.join("deps"), "lib.bin", 8 * BYTES_PER_MB as usize);

        let all = estimate_patterns(&target.display().to_string());
        assert_eq!(all.raw_mb, 18);

        let input = format!("{}\n!{}", target.display(), debug.display());
        let result = estimate_patterns(&input);
        assert_eq!(result.measured_paths, 1);
        assert_eq!(result.raw_mb, 2);
        assert_eq!(result.estimated_mb, 2);
    }

    #[test]
    fn test_home_expansion() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(expand_home("~/.cargo"), format!("{}/.cargo", home.display()));
        assert_eq!(expand_home("~user/x"), "~user/x");
        assert_eq!(expand_home("/abs"), "/abs");
    }
}
