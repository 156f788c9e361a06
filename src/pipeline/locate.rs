//! Primary source file selection

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Conventional entry points, in priority order
pub const ENTRY_POINTS: &[&str] = &["app.py", "main.py", "server.py", "run.py"];

const SOURCE_EXTENSION: &str = "py";

fn is_source(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION)
}

/// Picks the file to modernise under `root`.
///
/// The first entry-point name found wins, shallowest match first; otherwise
/// the largest non-empty source file by size, ties broken by path. `None`
/// when the tree has no entry point and every source file is empty.
pub fn locate_primary_source(root: &Path) -> Option<PathBuf> {
    let sources: Vec<(PathBuf, usize, u64)> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_source(entry.path()))
        .map(|entry| {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            (entry.path().to_path_buf(), entry.depth(), size)
        })
        .collect();

    for name in ENTRY_POINTS {
        let found = sources
            .iter()
            .filter(|(path, _, _)| path.file_name().and_then(|n| n.to_str()) == Some(*name))
            .min_by_key(|(_, depth, _)| *depth);
        if let Some((path, _, _)) = found {
            debug!("Primary source is entry point {}", path.display());
            return Some(path.clone());
        }
    }

    let largest = sources
        .into_iter()
        .filter(|(_, _, size)| *size > 0)
        .max_by(|(a_path, _, a_size), (b_path, _, b_size)| {
            a_size.cmp(b_size).then_with(|| b_path.cmp(a_path))
        })
        .map(|(path, _, _)| path);

    if let Some(path) = &largest {
        debug!("Primary source is largest file {}", path.display());
    }
    largest
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_entry_point_priority() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "run.py", "x");
        write(dir.path(), "pkg/main.py", "x");
        write(dir.path(), "huge.py", &"y".repeat(1000));

        let found = locate_primary_source(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("pkg/main.py"));
    }

    #[test]
    fn test_shallowest_entry_point_wins() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/b/app.py", "x");
        write(dir.path(), "z/app.py", "x");

        let found = locate_primary_source(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("z/app.py"));
    }

    #[test]
    fn test_largest_file_fallback() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "small.py", "x");
        write(dir.path(), "lib/big.py", &"y".repeat(100));
        write(dir.path(), "README.md", &"z".repeat(5000));

        let found = locate_primary_source(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("lib/big.py"));
    }

    #[test]
    fn test_no_sources() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "notes.txt", "hello");
        assert!(locate_primary_source(dir.path()).is_none());
    }

    #[test]
    fn test_empty_sources_are_not_candidates() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pkg/__init__.py", "");
        write(dir.path(), "pkg/models.py", "");
        assert!(locate_primary_source(dir.path()).is_none());

        write(dir.path(), "pkg/views.py", "x = 1");
        assert_eq!(
            locate_primary_source(dir.path()).unwrap(),
            dir.path().join("pkg/views.py")
        );
    }

    #[test]
    fn test_empty_entry_point_still_wins() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "main.py", "");
        write(dir.path(), "lib.py", "x = 1");
        assert_eq!(locate_primary_source(dir.path()).unwrap(), dir.path().join("main.py"));
    }
}
