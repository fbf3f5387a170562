//! Scenario file discovery.

use globset::{Glob, GlobSet, GlobSetBuilder};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{ScenaristError, ScenaristResult};

/// Suffix scenario files are expected to carry.
pub const SCENARIO_FILE_SUFFIX: &str = ".scen.json";

/// Expand scenario patterns relative to the working directory.
///
/// A pattern naming an existing file is taken as-is, whatever its suffix.
/// One naming a directory matches every scenario file beneath it. Anything
/// else is a glob over relative paths. Output is sorted and de-duplicated.
pub fn find_matching_files(patterns: &[String]) -> ScenaristResult<Vec<PathBuf>> {
    let mut found = BTreeSet::new();
    let mut globs = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            found.insert(path.to_path_buf());
        } else if path.is_dir() {
            collect_scenario_files(path, &mut found)?;
        } else {
            globs.push(pattern.as_str());
        }
    }

    if !globs.is_empty() {
        let set = compile_globset(&globs)?;
        for entry in WalkDir::new(".").follow_links(false) {
            let entry = entry.map_err(walk_error)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let p = entry.path();
            let rel = p.strip_prefix(".").unwrap_or(p);
            if set.is_match(rel) {
                found.insert(rel.to_path_buf());
            }
        }
    }

    Ok(found.into_iter().collect())
}

fn collect_scenario_files(dir: &Path, found: &mut BTreeSet<PathBuf>) -> ScenaristResult<()> {
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(walk_error)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_scenario = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(SCENARIO_FILE_SUFFIX));
        if is_scenario {
            found.insert(entry.into_path());
        }
    }
    Ok(())
}

fn compile_globset(patterns: &[&str]) -> ScenaristResult<GlobSet> {
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        let g = Glob::new(p)
            .map_err(|e| ScenaristError::InvalidArgument(format!("invalid glob {p:?}: {e}")))?;
        b.add(g);
    }
    b.build()
        .map_err(|e| ScenaristError::InvalidArgument(format!("invalid globset: {e}")))
}

fn walk_error(e: walkdir::Error) -> ScenaristError {
    let msg = e.to_string();
    ScenaristError::Io(
        e.into_io_error()
            .unwrap_or_else(|| std::io::Error::other(msg)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scenarist-fsutil-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        dir
    }

    #[test]
    fn directory_patterns_pick_up_scenario_files_only() {
        let dir = scratch_dir("dir");
        std::fs::write(dir.join("a.scen.json"), "{}").unwrap();
        std::fs::write(dir.join("nested/b.scen.json"), "{}").unwrap();
        std::fs::write(dir.join("notes.txt"), "skip me").unwrap();

        let files = find_matching_files(&[dir.display().to_string()]).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| p
            .to_str()
            .is_some_and(|s| s.ends_with(SCENARIO_FILE_SUFFIX))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn explicit_file_paths_pass_through_whatever_the_suffix() {
        let dir = scratch_dir("file");
        let odd = dir.join("odd-name.json");
        std::fs::write(&odd, "{}").unwrap();

        let files = find_matching_files(&[odd.display().to_string()]).unwrap();
        assert_eq!(files, vec![odd]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn bad_globs_are_an_argument_error() {
        let err = find_matching_files(&["[".to_string()]).unwrap_err();
        assert!(matches!(err, ScenaristError::InvalidArgument(_)));
    }
}
